use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use storelink_sources::{StorageConfig, StorageId};

use crate::drivers::{self, Driver};
use crate::utils::paths;

/// Errors mounting or looking up storages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("duplicate storage id `{0}`")]
    DuplicateId(StorageId),
    #[error("duplicate mount path `{0}`")]
    DuplicateMount(String),
    #[error("mount path `{0}` is not a clean absolute path")]
    InvalidMount(String),
    #[error("no storage mounted at `{0}`")]
    NotMounted(String),
}

/// The registry of all mounted storages.
///
/// Virtual paths are resolved to the storage with the longest mount path containing them.
#[derive(Debug, Default)]
pub struct Storages {
    /// Sorted by mount path length, longest first.
    drivers: Vec<Arc<dyn Driver>>,
}

impl Storages {
    /// Creates the drivers for all given storages.
    pub fn from_config(configs: &[StorageConfig]) -> Result<Self, StorageError> {
        let mut ids = HashSet::new();
        let mut mounts = HashSet::new();
        let mut drivers = Vec::with_capacity(configs.len());

        for config in configs {
            let mount_path = config.mount_path();
            if paths::clean_path(mount_path) != mount_path {
                return Err(StorageError::InvalidMount(mount_path.to_owned()));
            }
            if !ids.insert(config.id().clone()) {
                return Err(StorageError::DuplicateId(config.id().clone()));
            }
            if !mounts.insert(mount_path.to_owned()) {
                return Err(StorageError::DuplicateMount(mount_path.to_owned()));
            }

            tracing::info!(
                storage = %config.id(),
                kind = config.type_name(),
                "Mounting storage at {}",
                mount_path
            );
            drivers.push(drivers::from_config(config));
        }

        Ok(Self::from_drivers(drivers))
    }

    /// Creates a registry from already constructed drivers.
    pub fn from_drivers(mut drivers: Vec<Arc<dyn Driver>>) -> Self {
        drivers.sort_by_key(|driver| std::cmp::Reverse(driver.storage().mount_path.len()));
        Self { drivers }
    }

    /// Resolves a virtual path to its storage and the path inside that storage.
    pub fn get_storage_and_actual_path(
        &self,
        path: &str,
    ) -> Result<(Arc<dyn Driver>, String), StorageError> {
        let path = paths::clean_path(path);
        self.drivers
            .iter()
            .find_map(|driver| {
                let actual = paths::strip_mount(&driver.storage().mount_path, &path)?;
                Some((Arc::clone(driver), actual.to_owned()))
            })
            .ok_or(StorageError::NotMounted(path))
    }
}
