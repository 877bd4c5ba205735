use std::sync::Arc;

use storelink_service::config::{Config, LinkCacheConfig};
use storelink_service::drivers::Driver;
use storelink_service::services::links::LinkService;
use storelink_test as test;
use storelink_test::MockDriver;

mod links;
mod operations;
mod storages;

/// Setup tests and create a link service.
///
/// The link cache is configured through `update_config`, starting from the defaults.
pub fn setup_links(update_config: impl FnOnce(&mut LinkCacheConfig)) -> LinkService {
    test::setup();

    let mut config = Config::default();
    update_config(&mut config.caches.links);
    LinkService::new(&config.caches.links)
}

/// Wraps the mock, returning both the handle for inspection and the driver to pass around.
pub fn mock(driver: MockDriver) -> (Arc<MockDriver>, Arc<dyn Driver>) {
    let mock = Arc::new(driver);
    let driver: Arc<dyn Driver> = mock.clone();
    (mock, driver)
}
