//! Helpers for testing the storelink service.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`tempdir`], make sure that the handle to the temp directory is held for the
//!    entire lifetime of the test, e.g. `let dir = test::tempdir()`. The directory is removed as
//!    soon as the handle is dropped.
//!
//!  - Use [`MockDriver`] to observe how often a storage backend is actually called, and to
//!    control how long calls take and what they return.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;
use url::Url;

use storelink_service::drivers::{
    Driver, DriverError, DriverResult, FileStream, Link, LinkArgs, LinkTarget, Obj,
};
use storelink_sources::{
    LocalStorageConfig, RootFolder, SignConfig, Storage, StorageConfig, StorageId,
};

pub use tempfile::TempDir;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the storelink crates and mutes all
///    other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("storelink_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped, unless
/// it is explicitly kept. Use it as a guard to automatically clean up after tests.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// Get a local storage config backed by the given directory.
///
/// With `sign`, links are signed URLs that expire after a minute.
pub fn local_storage(id: &str, mount_path: &str, root_folder: PathBuf, sign: bool) -> StorageConfig {
    let sign = sign.then(|| SignConfig {
        base_url: "https://files.example.com/d/".parse().unwrap(),
        secret: "test-secret".into(),
        ttl: Duration::from_secs(60),
    });
    StorageConfig::Local(Arc::new(LocalStorageConfig {
        id: StorageId::new(id),
        mount_path: mount_path.into(),
        root_folder,
        root: None,
        sign,
    }))
}

/// Creates an [`Obj`] with a fixed modification time.
pub fn obj(name: &str, size: u64, is_dir: bool) -> Obj {
    Obj {
        id: None,
        name: name.into(),
        size,
        modified: DateTime::<Utc>::UNIX_EPOCH,
        is_dir,
    }
}

/// A storage driver that records its calls instead of talking to a real backend.
///
/// Links are served from a queue of scripted results first. Once that is empty, a fresh link
/// is made up for every call, expiring after the configured TTL (or never, without TTL).
#[derive(Debug)]
pub struct MockDriver {
    storage: Storage,
    delay: Duration,
    ttl: Option<TimeDelta>,
    panics: bool,
    link_calls: AtomicUsize,
    link_results: Mutex<VecDeque<DriverResult<Link>>>,
    folders: Mutex<BTreeMap<String, Vec<Obj>>>,
    calls: Mutex<Vec<String>>,
}

impl MockDriver {
    pub fn new(id: &str, mount_path: &str) -> Self {
        Self {
            storage: Storage {
                id: StorageId::new(id),
                kind: "mock",
                mount_path: mount_path.into(),
                modified: DateTime::<Utc>::UNIX_EPOCH,
                root: None,
            },
            delay: Duration::ZERO,
            ttl: None,
            panics: false,
            link_calls: AtomicUsize::new(0),
            link_results: Default::default(),
            folders: Default::default(),
            calls: Default::default(),
        }
    }

    /// Makes every link call take `delay`, measured with the tokio clock.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes generated links expire `ttl` after they were created.
    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Makes every link call panic.
    pub fn with_panics(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Marks the storage root.
    pub fn with_root(mut self, root: RootFolder) -> Self {
        self.storage.root = Some(root);
        self
    }

    /// Adds a folder with the given contents.
    pub fn with_folder(self, path: &str, objs: Vec<Obj>) -> Self {
        self.folders.lock().insert(path.into(), objs);
        self
    }

    /// Queues the result for the next link call.
    pub fn push_link_result(&self, result: DriverResult<Link>) {
        self.link_results.lock().push_back(result);
    }

    /// The number of link calls that reached this driver.
    pub fn link_calls(&self) -> usize {
        self.link_calls.load(Ordering::SeqCst)
    }

    /// All calls other than link calls, in the order they were made.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) -> DriverResult<()> {
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn storage(&self) -> &Storage {
        &self.storage
    }

    async fn list(&self, path: &str) -> DriverResult<Vec<Obj>> {
        self.calls.lock().push(format!("list {path}"));
        self.folders
            .lock()
            .get(path)
            .cloned()
            .ok_or(DriverError::NotFound)
    }

    async fn link(&self, path: &str, _args: &LinkArgs) -> DriverResult<Link> {
        let call = self.link_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("link call {call} for {path} panicked");
        }

        if let Some(result) = self.link_results.lock().pop_front() {
            return result;
        }

        let url = format!(
            "https://mock.example.com{}{path}?call={call}",
            self.storage.mount_path
        );
        let url = Url::parse(&url).map_err(|err| DriverError::Storage(err.to_string()))?;
        let link = Link::new(LinkTarget::Url(url));
        Ok(match self.ttl {
            Some(ttl) => link.with_expiration(Utc::now() + ttl),
            None => link,
        })
    }

    async fn make_dir(&self, path: &str) -> DriverResult<()> {
        self.record(format!("mkdir {path}"))
    }

    async fn move_obj(&self, src_path: &str, dst_dir: &str) -> DriverResult<()> {
        self.record(format!("move {src_path} -> {dst_dir}"))
    }

    async fn rename(&self, src_path: &str, new_name: &str) -> DriverResult<()> {
        self.record(format!("rename {src_path} -> {new_name}"))
    }

    async fn copy(&self, src_path: &str, dst_dir: &str) -> DriverResult<()> {
        self.record(format!("copy {src_path} -> {dst_dir}"))
    }

    async fn remove(&self, path: &str) -> DriverResult<()> {
        self.record(format!("remove {path}"))
    }

    async fn put(&self, dst_dir: &str, mut file: FileStream) -> DriverResult<()> {
        let mut contents = Vec::new();
        file.reader.read_to_end(&mut contents).await?;
        self.record(format!("put {dst_dir} {} ({} bytes)", file.name, contents.len()))
    }
}
