//! Provides the shared services and a way to initialize them.
//!
//! [`SharedServices`] mounts all configured storages and sets up the link cache according to
//! the provided [`Config`]. It is created once per process and handed to everything that needs
//! to resolve paths or links.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;

pub mod links;
pub mod storages;

use links::LinkService;
use storages::Storages;

pub struct SharedServices {
    pub config: Config,
    pub storages: Arc<Storages>,
    pub links: Arc<LinkService>,
}

impl SharedServices {
    pub fn new(config: Config) -> Result<Self> {
        let storages =
            Storages::from_config(&config.storages).context("failed to mount storages")?;
        let links = LinkService::new(&config.caches.links);

        Ok(Self {
            config,
            storages: Arc::new(storages),
            links: Arc::new(links),
        })
    }
}
