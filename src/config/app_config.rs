//! Top-level application configuration.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{deserialize_duration_from_seconds, HttpRetryConfig};

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_notification_channel_capacity() -> u32 {
    1024
}

fn default_magic_eden_base_url() -> String {
    "https://api-mainnet.magiceden.dev".to_string()
}

fn default_opensea_base_url() -> String {
    "https://api.opensea.io".to_string()
}

/// Application configuration, read from `app.yaml` in the config directory
/// with `TOKENWATCH__`-prefixed environment overrides.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Connection URL for the SQLite state database.
    pub database_url: String,

    /// Path to the collections configuration file.
    #[serde(skip_deserializing)]
    pub collections_config_path: PathBuf,

    /// Retry policy for calls to upstream marketplace APIs.
    #[serde(default)]
    pub http_retry_config: HttpRetryConfig,

    /// Maximum time to wait for in-flight flushes during shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout: Duration,

    /// Capacity of the channel carrying emitted events to the notifier.
    #[serde(default = "default_notification_channel_capacity")]
    pub notification_channel_capacity: u32,

    /// Base URL of the Magic Eden API.
    #[serde(default = "default_magic_eden_base_url")]
    pub magic_eden_base_url: String,

    /// Base URL of the OpenSea API.
    #[serde(default = "default_opensea_base_url")]
    pub opensea_base_url: String,

    /// OpenSea API key. The secondary source is disabled when unset.
    #[serde(default)]
    pub opensea_api_key: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from `{config_dir}/app.yaml` plus environment
    /// overrides, and resolves the collections file path relative to the same
    /// directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("TOKENWATCH").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        config.collections_config_path = Path::new(config_dir_str).join("collections.yaml");

        Ok(config)
    }
}
