use chrono::{DateTime, Utc};

use crate::{RootFolder, StorageConfig, StorageId};

/// The runtime identity of a mounted storage account.
///
/// Every driver exposes one of these. It is used to tell apart storages of the same type when
/// deriving cache keys, and to answer lookups of the storage root.
#[derive(Clone, Debug)]
pub struct Storage {
    /// Unique storage identifier.
    pub id: StorageId,
    /// The storage type, as in [`StorageConfig::type_name`].
    pub kind: &'static str,
    /// Virtual path the storage is mounted at.
    pub mount_path: String,
    /// When the storage was last (re)configured.
    pub modified: DateTime<Utc>,
    /// Optional marker for the storage root.
    pub root: Option<RootFolder>,
}

impl Storage {
    /// Creates the identity for the given config, marking it as modified right now.
    pub fn from_config(config: &StorageConfig) -> Self {
        let root = match config {
            StorageConfig::Local(local) => local.root.clone(),
        };
        Self {
            id: config.id().clone(),
            kind: config.type_name(),
            mount_path: config.mount_path().to_owned(),
            modified: Utc::now(),
            root,
        }
    }
}
