//! # Link caching infrastructure
//!
//! Resolving a link on a storage backend is usually a slow remote call, and the resulting links
//! are valid for a while. This module contains the two building blocks that avoid redundant
//! backend calls, and the [`CacheKey`] they are both keyed by.
//!
//! ## Layers
//!
//! - An [`ExpiringCache`], holding resolved values until a per-entry absolute expiration.
//!   Entries are only visible strictly before their expiration.
//! - A [`Coalescer`], which deduplicates concurrent computations for the same key: at most one
//!   computation runs per key, and all concurrent callers share its result.
//!
//! A request goes through the following steps:
//! - First, it is looked up in the [`ExpiringCache`]. A hit is returned right away.
//! - On miss, it is handed to the [`Coalescer`], which either joins a running computation or
//!   spawns a new one.
//! - A fresh result is put into the [`ExpiringCache`] from within the computation if it carries
//!   an expiration, so it is visible before any waiting caller is released.
//!
//! Results without an expiration are never cached; every request for those goes through the
//! [`Coalescer`] again.
//!
//! ### Metrics
//!
//! Each of those is tagged with the type of the storage:
//!
//! - `links.access`: All accesses.
//! - `links.memory.hit`: Accesses served by the [`ExpiringCache`].
//! - `links.computation`: Actual backend calls.
//! - `links.cached` / `links.uncacheable`: Fresh results with and without an expiration.
//!
//! The [`Coalescer`] additionally reports `coalescer.channel.hit` and `coalescer.channel.miss`,
//! tagged with the coalescer name.
//!
//! ### Configuration
//!
//! Request coalescing is always active. The capacity of the [`ExpiringCache`] can be bounded by
//! [`LinkCacheConfig::capacity`](crate::config::LinkCacheConfig::capacity); it is otherwise
//! only bounded by expiration.
//!
//! ## [`CacheKey`]
//!
//! The [`CacheKey`] is derived from the identity of the storage (its id, type and mount path)
//! and the normalized path of the resource. It contains human-readable metadata, which is
//! SHA256-hashed to form the actual key.
//!
//! **NOTE**: Care must be taken to make sure that this metadata is stable, otherwise two
//! requests for the same resource would not be deduplicated.

mod cache_key;
mod coalesce;
mod expiring;

pub use cache_key::CacheKey;
pub use coalesce::{ChannelDropped, Coalescer};
pub use expiring::ExpiringCache;
