//! Storage drivers.
//!
//! A [`Driver`] is the capability interface to one mounted storage account. It exposes the
//! usual file operations, plus link resolution: turning a path into something a client can use
//! to access the file directly, like a signed download URL.
//!
//! Drivers are not expected to do any caching themselves; link caching and request coalescing
//! happen in [`LinkService`](crate::services::links::LinkService).

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncRead;
use url::Url;

pub use storelink_sources::{Storage, StorageConfig};

mod local;

pub use local::{LocalDriver, verify_signature};

/// An error returned by a storage backend.
///
/// Errors are cloneable, as a single failed backend call is reported to every caller that
/// waited for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The object does not exist on the storage.
    #[error("object not found")]
    NotFound,
    /// A folder was expected, but the object is a file.
    #[error("not a folder")]
    NotFolder,
    /// A file was expected, but the object is a folder.
    #[error("not a file")]
    NotFile,
    /// The name is not usable as a single path segment.
    #[error("invalid object name: {0}")]
    InvalidName(String),
    /// The storage refused access.
    ///
    /// The attached string contains the storage's response.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The operation is not supported by this storage type.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    /// Any other problem talking to the storage.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<io::Error> for DriverError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            _ => Self::Storage(err.to_string()),
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// A file or folder on a storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Obj {
    /// The storage specific id of the object, if the storage addresses objects by id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

/// Details about the client a link is resolved for.
///
/// Some storages bind links to the requesting client, or need to forward its headers.
#[derive(Debug, Clone, Default)]
pub struct LinkArgs {
    pub ip: Option<IpAddr>,
    pub headers: BTreeMap<String, String>,
}

/// What a [`Link`] points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    /// A URL the client can download from.
    Url(Url),
    /// A path on the local file system.
    Path(PathBuf),
}

/// A resolved, directly usable access link for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub target: LinkTarget,
    /// Headers the client has to send along when using the link.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// When the link stops being valid.
    ///
    /// `None` means there is no guarantee at all, and the link must not be reused.
    pub expiration: Option<DateTime<Utc>>,
}

impl Link {
    /// Creates a link without headers and without an expiration.
    pub fn new(target: LinkTarget) -> Self {
        Self {
            target,
            headers: BTreeMap::new(),
            expiration: None,
        }
    }

    /// Sets the expiration of this link.
    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }
}

/// A file being uploaded to a storage.
pub struct FileStream {
    pub name: String,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl FileStream {
    pub fn new(name: impl Into<String>, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            name: name.into(),
            size: None,
            mime_type: None,
            reader: Box::pin(reader),
        }
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// The capability interface to a mounted storage account.
///
/// All paths are virtual paths inside the storage, relative to its mount point.
#[async_trait]
pub trait Driver: fmt::Debug + Send + Sync + 'static {
    /// The identity of the storage this driver talks to.
    fn storage(&self) -> &Storage;

    /// Lists the contents of the folder at `path`.
    async fn list(&self, path: &str) -> DriverResult<Vec<Obj>>;

    /// Resolves the file at `path` into a directly usable [`Link`].
    async fn link(&self, path: &str, args: &LinkArgs) -> DriverResult<Link>;

    /// Creates the folder at `path`, including missing parents.
    async fn make_dir(&self, path: &str) -> DriverResult<()>;

    /// Moves the object at `src_path` into the folder `dst_dir`.
    async fn move_obj(&self, src_path: &str, dst_dir: &str) -> DriverResult<()>;

    /// Renames the object at `src_path` to `new_name`, keeping it in the same folder.
    async fn rename(&self, src_path: &str, new_name: &str) -> DriverResult<()>;

    /// Copies the object at `src_path` into the folder `dst_dir`.
    async fn copy(&self, src_path: &str, dst_dir: &str) -> DriverResult<()>;

    /// Removes the object at `path`, recursively for folders.
    async fn remove(&self, path: &str) -> DriverResult<()>;

    /// Uploads `file` into the folder `dst_dir`.
    async fn put(&self, dst_dir: &str, file: FileStream) -> DriverResult<()>;
}

/// Creates the driver for the given storage config.
pub fn from_config(config: &StorageConfig) -> Arc<dyn Driver> {
    match config {
        StorageConfig::Local(local) => Arc::new(LocalDriver::new(Arc::clone(local))),
    }
}
