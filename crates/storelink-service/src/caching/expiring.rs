use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// An item saved in the in-memory moka cache.
#[derive(Clone, Debug)]
struct ExpiringItem<V> {
    /// The instant after which the item must no longer be handed out.
    expiration: DateTime<Utc>,
    /// The actual data.
    value: V,
}

/// A struct implementing [`moka::Expiry`] that uses the [`ExpiringItem`] expiration as the
/// explicit eviction time.
struct ItemExpiration;

/// Returns the duration from now until `expiration`.
///
/// In case the `expiration` already elapsed, this will return `Some(ZERO)`.
fn saturating_duration_until(expiration: DateTime<Utc>) -> Option<Duration> {
    Some((expiration - Utc::now()).to_std().unwrap_or_default())
}

impl<K, V> moka::Expiry<K, ExpiringItem<V>> for ItemExpiration {
    fn expire_after_create(
        &self,
        _key: &K,
        value: &ExpiringItem<V>,
        _current_time: Instant,
    ) -> Option<Duration> {
        saturating_duration_until(value.expiration)
    }

    fn expire_after_update(
        &self,
        _key: &K,
        value: &ExpiringItem<V>,
        _current_time: Instant,
        _current_duration: Option<Duration>,
    ) -> Option<Duration> {
        saturating_duration_until(value.expiration)
    }
}

/// A concurrent in-memory cache whose entries expire at an absolute, per-entry instant.
///
/// The expiration is checked on every lookup, so an entry is only ever visible strictly before
/// its expiration. Expired entries are additionally evicted by moka in the background, which
/// keeps the memory bounded by the set of live entries.
///
/// Clones share the same underlying storage.
pub struct ExpiringCache<K, V> {
    name: &'static str,
    cache: moka::sync::Cache<K, ExpiringItem<V>>,
}

impl<K, V> Clone for ExpiringCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            cache: self.cache.clone(),
        }
    }
}

impl<K, V> fmt::Debug for ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("name", &self.name)
            .field("in-memory items", &self.cache.entry_count())
            .finish()
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new cache.
    ///
    /// `capacity` bounds the number of entries. `None` means the cache is only bounded by
    /// expiration.
    pub fn new(name: &'static str, capacity: Option<u64>) -> Self {
        let mut builder = moka::sync::Cache::<K, ExpiringItem<V>>::builder()
            .name(name)
            .expire_after(ItemExpiration);
        if let Some(capacity) = capacity {
            builder = builder.max_capacity(capacity);
        }

        Self {
            name,
            cache: builder.build(),
        }
    }

    /// Looks up the value for `key`, if it exists and has not yet expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    /// Looks up the value for `key` as seen at the instant `now`.
    ///
    /// The entry is a hit only if `now` is strictly before its expiration.
    pub fn get_at(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        let item = self.cache.get(key)?;
        (now < item.expiration).then_some(item.value)
    }

    /// Stores `value` under `key`, replacing any previous entry, until `expiration`.
    ///
    /// Values that would already be expired are not stored at all.
    pub fn set(&self, key: K, value: V, expiration: DateTime<Utc>) {
        if expiration <= Utc::now() {
            tracing::trace!(cache = self.name, %expiration, "Not caching already expired value");
            return;
        }
        self.cache.insert(key, ExpiringItem { expiration, value });
    }
}
