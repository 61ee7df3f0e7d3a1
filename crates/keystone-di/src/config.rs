//! Container configuration
//!
//! Loaded from `KEYSTONE_*` environment variables through the `config`
//! crate, or built in code. Only the environment is consulted; there is no
//! configuration file.

use std::time::Duration;

use ::config::{Config, Environment};
use keystone_common::LogLevel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment prefix for [`ContainerConfig::from_env`]
pub const ENV_PREFIX: &str = "KEYSTONE";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Load error: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Settings a container is created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Container name; root of the logger hierarchy
    pub name: String,
    /// How long `stop` may take before remaining disposals are abandoned;
    /// unset waits indefinitely
    pub shutdown_timeout_ms: Option<u64>,
    pub log_level: String,
    /// Longest chain of nested lookups a single resolution may build
    pub max_resolution_depth: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: "keystone".to_string(),
            shutdown_timeout_ms: None,
            log_level: "info".to_string(),
            max_resolution_depth: 64,
        }
    }
}

impl ContainerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Read `KEYSTONE_NAME`, `KEYSTONE_SHUTDOWN_TIMEOUT_MS`, `KEYSTONE_LOG_LEVEL`
    /// and `KEYSTONE_MAX_RESOLUTION_DEPTH`; unset keys keep their defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?;
        let config: ContainerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level.as_str().to_lowercase();
        self
    }

    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "container name must not be empty".to_string(),
            ));
        }
        if LogLevel::from_str(&self.log_level).is_none() {
            return Err(ConfigError::Validation(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::Validation(
                "max_resolution_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// `None` waits for teardown indefinitely
    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout_ms.map(Duration::from_millis)
    }

    /// Parsed log level, `Info` if unrecognized
    pub fn level(&self) -> LogLevel {
        LogLevel::from_str(&self.log_level).unwrap_or(LogLevel::Info)
    }
}
