//! Utilities dealing with storage configuration.
//!
//! Includes the configuration of the storages that can be mounted, and the runtime identity
//! ([`Storage`]) that every driver exposes to the link cache and the forwarding operations.

#![warn(missing_docs)]

mod sources;
mod storage;

pub use sources::*;
pub use storage::*;
