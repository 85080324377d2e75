pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;

pub use config::ServerConfig;
pub use crate::core::{aggregator::Aggregator, fetcher::HttpFetcher};
pub use utils::error::{Result, ServiceError};
