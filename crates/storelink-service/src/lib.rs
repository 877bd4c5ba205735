#[macro_use]
pub mod metrics;

pub mod caching;
pub mod config;
pub mod drivers;
pub mod logging;
pub mod operations;
pub mod services;
pub mod utils;
