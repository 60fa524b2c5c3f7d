use crate::traits::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable that overrides the configured address
pub const ADDRESS_ENV_VAR: &str = "LIFELINE_ADDRESS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Connection configuration
///
/// Read once per connect attempt; the manager never mutates it except for the
/// address, which can be changed through `ConnectionManager::set_address`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// WebSocket URL (wss:// or ws://)
    pub address: Option<String>,
    /// Sub-protocols offered during the handshake
    pub protocols: Vec<String>,
    /// Connect as soon as the manager is built
    pub auto_connect: bool,
    /// Delay before the first retry after an unexpected close
    pub base_reconnect_interval_ms: u64,
    /// Factor applied to the delay for every further consecutive retry
    pub reconnect_growth_factor: f64,
    /// Upper bound for the retry delay
    pub max_reconnect_interval_ms: u64,
    /// Send `{"ping": ms}` probes while open
    pub heartbeat_enabled: bool,
    pub heartbeat_interval_ms: u64,
    /// Silence tolerated before the connection is declared dead
    pub heartbeat_timeout_ms: u64,
    /// Log lifecycle chatter at info instead of debug
    pub verbose_logging: bool,
    /// Forward notifications to the upstream channel as well
    pub bubbles: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: None,
            protocols: Vec::new(),
            auto_connect: false,
            base_reconnect_interval_ms: 300,
            reconnect_growth_factor: 1.2,
            max_reconnect_interval_ms: 20_000,
            heartbeat_enabled: false,
            heartbeat_interval_ms: 2_500,
            heartbeat_timeout_ms: 10_000,
            verbose_logging: false,
            bubbles: false,
        }
    }
}

impl ConnectionConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config = Self::from_yaml_str(&yaml_content)?;

        // Override address from environment if present
        if let Ok(address) = std::env::var(ADDRESS_ENV_VAR) {
            info!("Overriding address from environment variable");
            config.address = Some(address);
        }

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML document without validating it
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.base_reconnect_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "base_reconnect_interval_ms must be greater than 0".to_string(),
            ));
        }

        if !self.reconnect_growth_factor.is_finite() || self.reconnect_growth_factor < 1.0 {
            return Err(ConfigError::ValidationError(
                "reconnect_growth_factor must be a finite number >= 1".to_string(),
            ));
        }

        if self.max_reconnect_interval_ms < self.base_reconnect_interval_ms {
            return Err(ConfigError::ValidationError(
                "max_reconnect_interval_ms must be >= base_reconnect_interval_ms".to_string(),
            ));
        }

        if self.heartbeat_enabled {
            if self.heartbeat_interval_ms == 0 {
                return Err(ConfigError::ValidationError(
                    "heartbeat_interval_ms must be greater than 0".to_string(),
                ));
            }
            if self.heartbeat_timeout_ms == 0 {
                return Err(ConfigError::ValidationError(
                    "heartbeat_timeout_ms must be greater than 0".to_string(),
                ));
            }
        }

        if let Some(address) = &self.address {
            if address.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "address must not be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn base_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_interval_ms)
    }

    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Backoff strategy described by this configuration
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.base_reconnect_interval(),
            self.reconnect_growth_factor,
            self.max_reconnect_interval(),
        )
    }
}
