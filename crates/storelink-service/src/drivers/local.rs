//! Support for storages on the local filesystem.
//!
//! Links are either plain local paths, which carry no expiration, or signed URLs pointing to
//! a server that serves the storage contents, which expire after the configured TTL.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use storelink_sources::{LocalStorageConfig, SignConfig, Storage, StorageConfig};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::{Driver, DriverError, DriverResult, FileStream, Link, LinkArgs, LinkTarget, Obj};
use crate::utils::paths;

/// Driver implementation for the local filesystem storage.
#[derive(Debug)]
pub struct LocalDriver {
    storage: Storage,
    config: Arc<LocalStorageConfig>,
}

impl LocalDriver {
    pub fn new(config: Arc<LocalStorageConfig>) -> Self {
        let storage = Storage::from_config(&StorageConfig::Local(Arc::clone(&config)));
        Self { storage, config }
    }

    /// Maps a virtual path onto the file system.
    ///
    /// Cleaning the path first guarantees the result stays inside the root folder.
    fn real_path(&self, path: &str) -> PathBuf {
        let path = paths::clean_path(path);
        self.config.root_folder.join(path.trim_start_matches('/'))
    }

    fn signed_url(&self, sign: &SignConfig, path: &str) -> DriverResult<(Url, DateTime<Utc>)> {
        let ttl = TimeDelta::from_std(sign.ttl)
            .map_err(|_| DriverError::Storage("signing ttl out of range".into()))?;
        let expires = (Utc::now() + ttl).timestamp();
        let expiration = DateTime::from_timestamp(expires, 0)
            .ok_or_else(|| DriverError::Storage("signing ttl out of range".into()))?;

        let mut url = sign.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DriverError::Storage(format!("invalid base url `{}`", sign.base_url)))?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("sign", &signature(&sign.secret, path, expires));

        Ok((url, expiration))
    }
}

fn signature(secret: &str, path: &str, expires: i64) -> String {
    let digest = Sha256::digest(format!("{secret}:{path}:{expires}"));
    hex::encode(digest)
}

/// Checks a signature handed out as part of a signed link.
///
/// `path` is the virtual path inside the storage, `expires` the unix timestamp of the link.
pub fn verify_signature(
    secret: &str,
    path: &str,
    expires: i64,
    sign: &str,
    now: DateTime<Utc>,
) -> bool {
    now.timestamp() < expires && signature(secret, &paths::clean_path(path), expires) == sign
}

#[async_trait]
impl Driver for LocalDriver {
    fn storage(&self) -> &Storage {
        &self.storage
    }

    async fn list(&self, path: &str) -> DriverResult<Vec<Obj>> {
        let real_path = self.real_path(path);
        tracing::trace!("Listing local folder {:?}", real_path);

        if !fs::metadata(&real_path).await?.is_dir() {
            return Err(DriverError::NotFolder);
        }

        let mut objs = Vec::new();
        let mut entries = fs::read_dir(&real_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            objs.push(Obj {
                id: None,
                name: entry.file_name().to_string_lossy().into_owned(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                modified: metadata.modified()?.into(),
                is_dir: metadata.is_dir(),
            });
        }
        objs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objs)
    }

    async fn link(&self, path: &str, _args: &LinkArgs) -> DriverResult<Link> {
        let path = paths::clean_path(path);
        let real_path = self.real_path(&path);
        tracing::debug!("Resolving link for {:?}", real_path);

        if fs::metadata(&real_path).await?.is_dir() {
            return Err(DriverError::NotFile);
        }

        match self.config.sign {
            Some(ref sign) => {
                let (url, expiration) = self.signed_url(sign, &path)?;
                Ok(Link::new(LinkTarget::Url(url)).with_expiration(expiration))
            }
            None => Ok(Link::new(LinkTarget::Path(real_path))),
        }
    }

    async fn make_dir(&self, path: &str) -> DriverResult<()> {
        fs::create_dir_all(self.real_path(path)).await?;
        Ok(())
    }

    async fn move_obj(&self, src_path: &str, dst_dir: &str) -> DriverResult<()> {
        let (_, name) = paths::split(src_path);
        let src = self.real_path(src_path);
        let dst = self.real_path(&paths::join(dst_dir, &name));
        fs::rename(src, dst).await?;
        Ok(())
    }

    async fn rename(&self, src_path: &str, new_name: &str) -> DriverResult<()> {
        if new_name.is_empty() || new_name.contains(['/', '\\']) || new_name == ".." {
            return Err(DriverError::InvalidName(new_name.to_owned()));
        }
        let (parent, _) = paths::split(src_path);
        let src = self.real_path(src_path);
        let dst = self.real_path(&paths::join(&parent, new_name));
        fs::rename(src, dst).await?;
        Ok(())
    }

    async fn copy(&self, src_path: &str, dst_dir: &str) -> DriverResult<()> {
        let (_, name) = paths::split(src_path);
        let src = self.real_path(src_path);
        let dst = self.real_path(&paths::join(dst_dir, &name));
        if dst.starts_with(&src) {
            return Err(DriverError::InvalidName(paths::clean_path(dst_dir)));
        }

        if !fs::metadata(&src).await?.is_dir() {
            fs::copy(&src, &dst).await?;
            return Ok(());
        }

        // each folder is created before its contents are copied
        let mut pending = vec![(src, dst)];
        while let Some((src, dst)) = pending.pop() {
            fs::create_dir_all(&dst).await?;
            let mut entries = fs::read_dir(&src).await?;
            while let Some(entry) = entries.next_entry().await? {
                let target = dst.join(entry.file_name());
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), target));
                } else {
                    fs::copy(entry.path(), target).await?;
                }
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> DriverResult<()> {
        let real_path = self.real_path(path);
        if fs::metadata(&real_path).await?.is_dir() {
            fs::remove_dir_all(real_path).await?;
        } else {
            fs::remove_file(real_path).await?;
        }
        Ok(())
    }

    async fn put(&self, dst_dir: &str, mut file: FileStream) -> DriverResult<()> {
        if file.name.is_empty() || file.name.contains(['/', '\\']) || file.name == ".." {
            return Err(DriverError::InvalidName(file.name));
        }
        let dst = self.real_path(&paths::join(dst_dir, &file.name));
        tracing::debug!("Uploading {} to {:?}", file.name, dst);

        let mut destination = fs::File::create(&dst).await?;
        tokio::io::copy(&mut file.reader, &mut destination).await?;
        destination.flush().await?;
        Ok(())
    }
}
