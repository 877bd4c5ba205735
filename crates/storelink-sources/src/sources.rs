//! Storage configuration types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

mod local;
pub use local::*;

/// An identifier for configured storages.
///
/// This is essentially a newtype for a string.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct StorageId(pub(crate) String);

impl StorageId {
    /// Creates a new [`StorageId`].
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Deref the [`StorageId`] to a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for a storage account.
///
/// A storage is mounted at a virtual `mount_path`, and all paths below that mount are resolved by
/// the storage's driver. Two storages of the same type are fully independent accounts.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Local file system.
    Local(Arc<LocalStorageConfig>),
}

impl StorageConfig {
    /// The unique identifier of this storage.
    pub fn id(&self) -> &StorageId {
        match self {
            Self::Local(x) => &x.id,
        }
    }

    /// The virtual path this storage is mounted at.
    pub fn mount_path(&self) -> &str {
        match self {
            Self::Local(x) => &x.mount_path,
        }
    }

    /// Name of this storage type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Local(..) => "local",
        }
    }
}

/// Marks the root folder of a storage.
///
/// Some backends address their root folder by an opaque id, others by a path inside the
/// account. Lookups of that root are answered without calling the backend.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootFolder {
    /// The root is addressed by an id, and corresponds to the path `/`.
    Id(String),
    /// The root is the given path inside the storage.
    Path(String),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_local_storage_config() {
        let yaml = r#"
            type: local
            id: media
            mount_path: /media
            root_folder: /srv/media
            root:
              path: /
            sign:
              base_url: "https://files.example.com/d/"
              secret: hunter2
              ttl: 15m
        "#;
        let config: StorageConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.id(), &StorageId::new("media"));
        assert_eq!(config.mount_path(), "/media");
        assert_eq!(config.type_name(), "local");

        let StorageConfig::Local(local) = config;
        assert_eq!(local.root, Some(RootFolder::Path("/".into())));
        let sign = local.sign.as_ref().unwrap();
        assert_eq!(sign.ttl, Duration::from_secs(15 * 60));
        assert_eq!(sign.base_url.as_str(), "https://files.example.com/d/");
    }

    #[test]
    fn test_local_storage_defaults() {
        let yaml = r#"
            type: local
            id: plain
            mount_path: /plain
            root_folder: /srv/plain
        "#;
        let StorageConfig::Local(local) = serde_yaml::from_str(yaml).unwrap();

        assert!(local.root.is_none());
        assert!(local.sign.is_none());
    }
}
