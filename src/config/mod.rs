//! Application configuration types and loading.

mod app_config;
mod http_retry;
mod loader;

pub use app_config::AppConfig;
pub use http_retry::{HttpRetryConfig, JitterSetting};
pub use loader::{ConfigLoader, LoaderError};

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Deserializes a [`Duration`] from a value given in milliseconds.
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Deserializes a [`Duration`] from a value given in seconds.
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Deserializes a [`Duration`] from a value given in minutes.
pub fn deserialize_duration_from_minutes<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let minutes = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(minutes * 60))
}
