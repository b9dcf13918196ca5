//! # Logging
//!
//! `tracing` subscriber setup with pretty, plain text and JSON output.
//! `RUST_LOG` always wins over the configured filter.

use serde_json::{json, Value};
use std::io;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{Environment, LogFormat, RivetConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(#[from] ParseError),

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    pub format: LogFormat,
    /// Include file and line number information
    pub include_location: bool,
    pub include_timestamp: bool,
    /// Custom fields to include in the initialization record
    pub global_fields: serde_json::Map<String, Value>,
    /// Full filter directive, e.g. "rivet=debug,sqlx=warn"; overrides `level`
    pub env_filter: Option<String>,
    pub service_name: Option<String>,
    pub service_version: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            include_location: false,
            include_timestamp: false,
            global_fields: serde_json::Map::new(),
            env_filter: None,
            service_name: None,
            service_version: None,
        }
    }
}

impl LoggingConfig {
    /// JSON lines with timestamps for log collectors
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            include_location: false,
            include_timestamp: true,
            global_fields: {
                let mut fields = serde_json::Map::new();
                fields.insert("env".to_string(), json!("production"));
                fields
            },
            env_filter: None,
            service_name: None,
            service_version: None,
        }
    }

    /// Plain lines without timestamps for terminals
    pub fn development() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            include_location: false,
            include_timestamp: false,
            global_fields: serde_json::Map::new(),
            env_filter: None,
            service_name: None,
            service_version: None,
        }
    }

    /// Create test logging configuration (minimal output)
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            format: LogFormat::Text,
            include_location: false,
            include_timestamp: false,
            global_fields: {
                let mut fields = serde_json::Map::new();
                fields.insert("env".to_string(), json!("test"));
                fields
            },
            env_filter: None,
            service_name: None,
            service_version: None,
        }
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self::development(),
            Environment::Testing => Self::test(),
            Environment::Production => Self::production(),
        }
    }

    /// Preset of the configured environment with the configured overrides applied
    pub fn from_config(config: &RivetConfig) -> Self {
        let mut logging = Self::for_environment(config.environment);
        if let Some(level) = &config.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = config.log_format {
            logging.format = format;
        }
        logging
    }

    /// Add a global field to the initialization record
    pub fn with_global_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.global_fields.insert(key.into(), value.into());
        self
    }

    /// Set service name and version
    pub fn with_service(mut self, name: &str, version: &str) -> Self {
        self.service_name = Some(name.to_string());
        self.service_version = Some(version.to_string());
        self
    }

    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive used when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        match &self.env_filter {
            Some(filter) => filter.clone(),
            // sqlx logs every statement at info
            None => format!("{},sqlx=warn", self.level),
        }
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let location = self.include_location;
        match (self.format, self.include_timestamp) {
            (LogFormat::Json, _) => fmt::layer()
                .json()
                .with_writer(io::stdout)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
            (LogFormat::Pretty, true) => fmt::layer()
                .pretty()
                .with_writer(io::stdout)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
            (LogFormat::Pretty, false) => fmt::layer()
                .pretty()
                .without_time()
                .with_writer(io::stdout)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
            (LogFormat::Text, true) => fmt::layer()
                .with_writer(io::stdout)
                .with_target(false)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
            (LogFormat::Text, false) => fmt::layer()
                .without_time()
                .with_writer(io::stdout)
                .with_target(false)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
        }
    }
}

/// Install the global subscriber
pub fn init_logging(config: LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directive()))?;

    tracing_subscriber::registry()
        .with(config.layer())
        .with(filter)
        .try_init()?;

    let mut init_msg = json!({
        "message": "Logging initialized",
        "level": config.level,
        "format": config.format.to_string(),
    });
    if let Some(name) = config.service_name {
        init_msg["service_name"] = json!(name);
    }
    if let Some(version) = config.service_version {
        init_msg["service_version"] = json!(version);
    }
    for (key, value) in config.global_fields {
        init_msg[key] = value;
    }
    tracing::debug!(target: "rivet::logging", "{}", init_msg);

    Ok(())
}
