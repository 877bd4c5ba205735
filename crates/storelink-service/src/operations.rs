//! File operations on a single storage.
//!
//! These normalize the path and forward to the [`Driver`], without any caching. Link resolution
//! is the exception and goes through the [`LinkService`](crate::services::links::LinkService).

use thiserror::Error;

use storelink_sources::RootFolder;

use crate::drivers::{Driver, DriverError, DriverResult, FileStream, Obj};
use crate::utils::paths;

/// An error looking up a single object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Listing the parent folder of the object failed.
    #[error("failed get parent list")]
    ParentList(#[source] DriverError),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Lists the folder at `path`.
pub async fn list(driver: &dyn Driver, path: &str) -> DriverResult<Vec<Obj>> {
    driver.list(&paths::clean_path(path)).await
}

/// Looks up the object at `path`.
///
/// The storage root is answered directly if the storage marks it, every other object is looked
/// up by name in a listing of its parent folder.
pub async fn get(driver: &dyn Driver, path: &str) -> Result<Obj, OperationError> {
    let path = paths::clean_path(path);
    let storage = driver.storage();

    let root = |id| Obj {
        id,
        name: "root".into(),
        size: 0,
        modified: storage.modified,
        is_dir: true,
    };
    match storage.root {
        Some(RootFolder::Id(ref id)) if path == "/" => return Ok(root(Some(id.clone()))),
        Some(RootFolder::Path(ref root_path)) if paths::path_equal(&path, root_path) => {
            return Ok(root(None));
        }
        _ => {}
    }

    let (dir, name) = paths::split(&path);
    let objs = list(driver, &dir)
        .await
        .map_err(OperationError::ParentList)?;
    objs.into_iter()
        .find(|obj| obj.name == name)
        .ok_or(OperationError::Driver(DriverError::NotFound))
}

/// Creates the folder at `path`.
pub async fn make_dir(driver: &dyn Driver, path: &str) -> DriverResult<()> {
    driver.make_dir(&paths::clean_path(path)).await
}

/// Moves the object at `src_path` into the folder `dst_dir`.
pub async fn move_obj(driver: &dyn Driver, src_path: &str, dst_dir: &str) -> DriverResult<()> {
    driver
        .move_obj(&paths::clean_path(src_path), &paths::clean_path(dst_dir))
        .await
}

/// Renames the object at `src_path` to `new_name`.
pub async fn rename(driver: &dyn Driver, src_path: &str, new_name: &str) -> DriverResult<()> {
    driver.rename(&paths::clean_path(src_path), new_name).await
}

/// Copies the object at `src_path` into the folder `dst_dir`.
pub async fn copy(driver: &dyn Driver, src_path: &str, dst_dir: &str) -> DriverResult<()> {
    driver
        .copy(&paths::clean_path(src_path), &paths::clean_path(dst_dir))
        .await
}

/// Removes the object at `path`.
pub async fn remove(driver: &dyn Driver, path: &str) -> DriverResult<()> {
    driver.remove(&paths::clean_path(path)).await
}

/// Uploads `file` into the folder `dst_dir`.
pub async fn put(driver: &dyn Driver, dst_dir: &str, file: FileStream) -> DriverResult<()> {
    driver.put(&paths::clean_path(dst_dir), file).await
}
