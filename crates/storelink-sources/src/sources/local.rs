use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{RootFolder, StorageId};

/// Configuration for a storage on the local file system.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LocalStorageConfig {
    /// Unique storage identifier.
    pub id: StorageId,

    /// Virtual path the storage is mounted at.
    pub mount_path: String,

    /// Directory on disk that backs this storage.
    pub root_folder: PathBuf,

    /// Optional marker for the storage root.
    #[serde(default)]
    pub root: Option<RootFolder>,

    /// When set, links are handed out as signed, expiring URLs instead of local paths.
    #[serde(default)]
    pub sign: Option<SignConfig>,
}

/// Configuration for handing out signed download URLs.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SignConfig {
    /// The base URL under which the storage contents are served.
    pub base_url: Url,

    /// Shared secret used to sign the URLs.
    pub secret: String,

    /// How long a signed URL stays valid.
    #[serde(with = "humantime_serde", default = "default_sign_ttl")]
    pub ttl: Duration,
}

fn default_sign_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}
