use std::fmt::{self, Write};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use storelink_sources::Storage;

use crate::utils::paths;

/// The key under which a resolved resource is cached and coalesced.
///
/// The key is the SHA-256 hash of a human-readable, stable metadata string, which contains the
/// identity of the storage and the normalized path. Equality only considers the hash.
#[derive(Debug, Clone, Eq)]
pub struct CacheKey {
    display: Arc<str>,
    metadata: Arc<str>,
    hash: [u8; 32],
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl std::hash::Hash for CacheKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl CacheKey {
    /// Creates a [`CacheKey`] for `path` on the given [`Storage`].
    ///
    /// The path is normalized first, so different spellings of the same path share a key.
    pub fn from_storage_path(storage: &Storage, path: &str) -> Self {
        let path = paths::clean_path(path);
        let mut builder = CacheKeyBuilder {
            display: paths::join(&storage.mount_path, &path),
            metadata: String::new(),
        };
        builder.write_storage_meta(storage).unwrap();
        builder.write_fmt(format_args!("path: {path}\n")).unwrap();
        builder.build()
    }

    /// Returns the human-readable metadata that forms the basis of the [`CacheKey`].
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// Returns the hex-formatted hash of this key.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// A builder for [`CacheKey`]s.
///
/// This builder implements the [`Write`](std::fmt::Write) trait, and the intention of it is to
/// accept human readable, but most importantly **stable**, input.
/// This input in then being hashed to form the [`CacheKey`].
pub struct CacheKeyBuilder {
    display: String,
    metadata: String,
}

impl CacheKeyBuilder {
    /// Writes the identity of the [`Storage`] into the [`CacheKey`].
    ///
    /// Both the id and the mount path are part of the identity, so two accounts of the same
    /// storage type never share keys.
    pub fn write_storage_meta(&mut self, storage: &Storage) -> Result<(), fmt::Error> {
        self.metadata.write_fmt(format_args!(
            "storage: {}\ntype: {}\nmount: {}\n",
            storage.id, storage.kind, storage.mount_path
        ))
    }

    /// Finalize the [`CacheKey`].
    pub fn build(self) -> CacheKey {
        let digest = Sha256::digest(&self.metadata);
        let mut hash = [0; 32];
        hash.copy_from_slice(&digest);

        CacheKey {
            display: self.display.into(),
            metadata: self.metadata.into(),
            hash,
        }
    }
}

impl fmt::Write for CacheKeyBuilder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.metadata.write_str(s)
    }
}
