//! Exposes the command line application.
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use storelink_service::config::Config;
use storelink_service::drivers::{Driver, FileStream, LinkArgs};
use storelink_service::metrics;
use storelink_service::operations;
use storelink_service::services::SharedServices;

use crate::logging;

/// Storelink commands.
#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Resolve a file into a directly usable link.
    Link {
        /// Virtual path of the file.
        path: String,
        /// The client IP the link is resolved for.
        #[arg(long)]
        ip: Option<IpAddr>,
    },
    /// List the contents of a folder.
    List { path: String },
    /// Show a single file or folder.
    Stat { path: String },
    /// Create a folder, including missing parents.
    Mkdir { path: String },
    /// Move a file or folder into another folder.
    Mv { src: String, dst_dir: String },
    /// Rename a file or folder.
    Rename { path: String, new_name: String },
    /// Copy a file or folder into another folder.
    Cp { src: String, dst_dir: String },
    /// Remove a file or folder.
    Rm { path: String },
    /// Upload a local file into a folder.
    Put { file: PathBuf, dst_dir: String },
}

/// Command line interface parser.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config()).context("failed loading config")?;

    // SAFETY: This is the only thread running at this point.
    unsafe { logging::init_logging(&config) };
    if let Some(ref statsd) = config.metrics.statsd {
        let mut tags = config.metrics.custom_tags.clone();
        if let Some(tag) = config.metrics.hostname_tag.clone() {
            if let Some(hostname) = hostname::get().ok().and_then(|s| s.into_string().ok()) {
                tags.insert(tag, hostname);
            }
        }
        metrics::configure_statsd(&config.metrics.prefix, statsd, tags)?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("storelink")
        .enable_all()
        .build()
        .context("failed to create runtime")?;

    runtime.block_on(async {
        let services = SharedServices::new(config)?;
        let output = run(&services, cli.command).await?;
        if let Some(output) = output {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Ok::<_, anyhow::Error>(())
    })
}

/// Runs a single command, returning its JSON output, if any.
async fn run(services: &SharedServices, command: Command) -> Result<Option<Value>> {
    let output = match command {
        Command::Link { path, ip } => {
            let (driver, path) = services.storages.get_storage_and_actual_path(&path)?;
            let args = LinkArgs {
                ip,
                ..Default::default()
            };

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    interrupt.cancel();
                }
            });

            let link = services
                .links
                .link_with_cancel(&driver, &path, &args, &cancel)
                .await?;
            Some(serde_json::to_value(&*link)?)
        }
        Command::List { path } => {
            let (driver, path) = services.storages.get_storage_and_actual_path(&path)?;
            let objs = operations::list(driver.as_ref(), &path).await?;
            Some(serde_json::to_value(objs)?)
        }
        Command::Stat { path } => {
            let (driver, path) = services.storages.get_storage_and_actual_path(&path)?;
            let obj = operations::get(driver.as_ref(), &path).await?;
            Some(serde_json::to_value(obj)?)
        }
        Command::Mkdir { path } => {
            let (driver, path) = services.storages.get_storage_and_actual_path(&path)?;
            operations::make_dir(driver.as_ref(), &path).await?;
            None
        }
        Command::Mv { src, dst_dir } => {
            let (driver, src, dst_dir) = same_storage(services, &src, &dst_dir)?;
            operations::move_obj(driver.as_ref(), &src, &dst_dir).await?;
            None
        }
        Command::Rename { path, new_name } => {
            let (driver, path) = services.storages.get_storage_and_actual_path(&path)?;
            operations::rename(driver.as_ref(), &path, &new_name).await?;
            None
        }
        Command::Cp { src, dst_dir } => {
            let (driver, src, dst_dir) = same_storage(services, &src, &dst_dir)?;
            operations::copy(driver.as_ref(), &src, &dst_dir).await?;
            None
        }
        Command::Rm { path } => {
            let (driver, path) = services.storages.get_storage_and_actual_path(&path)?;
            operations::remove(driver.as_ref(), &path).await?;
            None
        }
        Command::Put { file, dst_dir } => {
            let (driver, dst_dir) = services.storages.get_storage_and_actual_path(&dst_dir)?;
            let name = file
                .file_name()
                .and_then(|name| name.to_str())
                .with_context(|| format!("invalid file name `{}`", file.display()))?
                .to_owned();
            let reader = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("failed to open `{}`", file.display()))?;
            let mut stream = FileStream::new(name, reader);
            stream.size = tokio::fs::metadata(&file).await.ok().map(|m| m.len());
            operations::put(driver.as_ref(), &dst_dir, stream).await?;
            None
        }
    };
    Ok(output)
}

/// Resolves two paths that have to live on the same storage.
fn same_storage(
    services: &SharedServices,
    src: &str,
    dst: &str,
) -> Result<(Arc<dyn Driver>, String, String)> {
    let (src_driver, src) = services.storages.get_storage_and_actual_path(src)?;
    let (dst_driver, dst) = services.storages.get_storage_and_actual_path(dst)?;
    if src_driver.storage().id != dst_driver.storage().id {
        bail!(
            "cannot transfer between storages `{}` and `{}`",
            src_driver.storage().id,
            dst_driver.storage().id
        );
    }
    Ok((src_driver, src, dst))
}
