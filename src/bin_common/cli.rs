//! CLI utilities for binaries
//!
//! Handles configuration path lookup and command line arguments
//! for all binary executables.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Connection configuration (config/lifeline.yaml)
    Lifeline,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Lifeline => "config/lifeline.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        "LIFELINE_CONFIG_PATH"
    }

    /// Config type for the first command line argument, if one was given
    pub fn from_args(args: &[String]) -> Self {
        match args.first() {
            Some(path) => ConfigType::Custom(path.clone()),
            None => ConfigType::Lifeline,
        }
    }
}

/// Load configuration path from environment or use default
///
/// An explicit `Custom` path always wins over the environment.
///
/// # Examples
/// ```
/// use lifeline_app::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Custom("feed.yaml".to_string()));
/// assert_eq!(path.to_str(), Some("feed.yaml"));
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    if let ConfigType::Custom(path) = &config_type {
        return PathBuf::from(path);
    }

    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
