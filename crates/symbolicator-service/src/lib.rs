#[macro_use]
pub mod metrics;

pub mod config;
pub mod logging;
pub mod types;
pub mod utils;
