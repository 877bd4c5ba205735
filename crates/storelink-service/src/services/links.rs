//! Link resolution with caching and request coalescing.
//!
//! See the [`caching`](crate::caching) module docs for the layers a request goes through.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::caching::{CacheKey, ChannelDropped, Coalescer, ExpiringCache};
use crate::config::LinkCacheConfig;
use crate::drivers::{Driver, DriverError, Link, LinkArgs};
use crate::utils::paths;

/// An error resolving a [`Link`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The storage backend failed to produce the link.
    #[error("failed to get link")]
    Driver(#[from] DriverError),
    /// The caller stopped waiting for the link.
    #[error("link request was cancelled")]
    Cancelled,
    /// The link was not resolved within the configured wait timeout.
    #[error("link request timed out after {0:?}")]
    Timeout(Duration),
    /// The backend call went away without a result, e.g. because it panicked.
    #[error("link computation was interrupted")]
    Interrupted,
}

type LinkResult = Result<Arc<Link>, LinkError>;

/// Resolves links on storage drivers, caching them for as long as they are valid.
///
/// Concurrent requests for the same file on the same storage share a single backend call. Links
/// that carry an expiration are cached until that expiration; links without one are never
/// reused.
#[derive(Debug, Clone)]
pub struct LinkService {
    cache: ExpiringCache<CacheKey, Arc<Link>>,
    coalescer: Coalescer<CacheKey, LinkResult>,
    wait_timeout: Option<Duration>,
}

impl LinkService {
    pub fn new(config: &LinkCacheConfig) -> Self {
        Self {
            cache: ExpiringCache::new("links", config.capacity),
            coalescer: Coalescer::new("links"),
            wait_timeout: config.wait_timeout,
        }
    }

    /// Resolves the link for `path` on the storage behind `driver`.
    pub async fn link(
        &self,
        driver: &Arc<dyn Driver>,
        path: &str,
        args: &LinkArgs,
    ) -> LinkResult {
        self.link_with_cancel(driver, path, args, &CancellationToken::new())
            .await
    }

    /// Resolves the link like [`link`](Self::link), but stops waiting once `cancel` fires.
    ///
    /// Cancelling only affects this caller. The backend call keeps running for all other
    /// callers waiting for the same link, and its result is cached as usual.
    pub async fn link_with_cancel(
        &self,
        driver: &Arc<dyn Driver>,
        path: &str,
        args: &LinkArgs,
        cancel: &CancellationToken,
    ) -> LinkResult {
        let storage = driver.storage();
        let path = paths::clean_path(path);
        let key = CacheKey::from_storage_path(storage, &path);
        metric!(counter("links.access") += 1, "type" => storage.kind);

        if let Some(link) = self.cache.get(&key) {
            metric!(counter("links.memory.hit") += 1, "type" => storage.kind);
            tracing::trace!(%key, "Serving link from memory cache");
            return Ok(link);
        }

        let computation = self.coalescer.execute(key.clone(), || {
            compute_link(
                Arc::clone(driver),
                self.cache.clone(),
                key,
                path,
                args.clone(),
            )
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LinkError::Cancelled),
            result = self.wait(computation) => result,
        }
    }

    /// Returns the currently cached link for `path`, without ever calling the backend.
    pub fn cached(&self, driver: &dyn Driver, path: &str) -> Option<Arc<Link>> {
        self.cache
            .get(&CacheKey::from_storage_path(driver.storage(), path))
    }

    async fn wait(
        &self,
        computation: BoxFuture<'static, Result<LinkResult, ChannelDropped>>,
    ) -> LinkResult {
        let result = match self.wait_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, computation).await {
                Ok(result) => result,
                Err(_elapsed) => return Err(LinkError::Timeout(timeout)),
            },
            None => computation.await,
        };
        result.unwrap_or(Err(LinkError::Interrupted))
    }
}

/// Calls the backend, and caches the resulting link if it is cacheable.
///
/// This runs within the coalesced computation, so the cache is populated before the computation
/// is released and any waiter observes the result.
async fn compute_link(
    driver: Arc<dyn Driver>,
    cache: ExpiringCache<CacheKey, Arc<Link>>,
    key: CacheKey,
    path: String,
    args: LinkArgs,
) -> LinkResult {
    let kind = driver.storage().kind;
    metric!(counter("links.computation") += 1, "type" => kind);
    tracing::debug!(%key, "Resolving link on storage");

    let start = Instant::now();
    let result = driver.link(&path, &args).await;
    metric!(timer("links.computation.duration") = start.elapsed(), "type" => kind);

    let link = result.map_err(|err| {
        tracing::debug!(%key, error = %err, "Failed to resolve link");
        LinkError::Driver(err)
    })?;
    let link = Arc::new(link);

    match link.expiration {
        Some(expiration) => {
            metric!(counter("links.cached") += 1, "type" => kind);
            cache.set(key, Arc::clone(&link), expiration);
        }
        None => {
            metric!(counter("links.uncacheable") += 1, "type" => kind);
        }
    }

    Ok(link)
}
