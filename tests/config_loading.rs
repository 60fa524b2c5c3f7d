//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration lookup and the sample configuration.

use lifeline_app::bin_common::{load_config_from_env, ConfigType};
use lifeline_app::lifeline::ConnectionConfig;
use std::env;
use std::path::Path;

#[test]
fn test_lifeline_config_default() {
    // Clear env var to test default
    env::remove_var("LIFELINE_CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::Lifeline);
    assert_eq!(config_path.to_str().unwrap(), "config/lifeline.yaml");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_config_type_env_var_names() {
    assert_eq!(ConfigType::Lifeline.env_var_name(), "LIFELINE_CONFIG_PATH");
}

#[test]
fn test_sample_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/lifeline.yaml");
    let config = ConnectionConfig::load(&path).unwrap();

    assert!(config.address.is_some());
    assert_eq!(config.base_reconnect_interval_ms, 300);
    assert_eq!(config.reconnect_growth_factor, 1.2);
    assert_eq!(config.max_reconnect_interval_ms, 20_000);
    assert_eq!(config.heartbeat_interval_ms, 2_500);
    assert_eq!(config.heartbeat_timeout_ms, 10_000);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ConnectionConfig::from_yaml_str(
        r#"
address: "wss://example.com"
base_reconnect_interval_ms: 500
max_reconnect_interval_ms: 100
"#,
    )
    .unwrap();

    assert!(config.validate().is_err());
}
