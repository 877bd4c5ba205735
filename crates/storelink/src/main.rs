//! Storelink.
//!
//! Storelink mounts a set of storage backends into one virtual file tree. It resolves files into
//! directly usable, time-limited links, and forwards file operations to the backend that owns a
//! path.

#![warn(
    missing_docs,
    missing_debug_implementations,
    unused_crate_dependencies,
    clippy::all
)]

mod cli;
mod logging;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
