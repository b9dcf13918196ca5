//! # rivet-core
//!
//! Environment-driven configuration and logging setup shared by the rivet crates.

pub mod config;
pub mod logging;

pub use config::{
    mask_database_url, ConfigError, ConfigSource, ConfigTrait, DatabaseConfig, Environment,
    LogFormat, RivetConfig,
};
pub use logging::{init_logging, LoggingConfig, LoggingError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
