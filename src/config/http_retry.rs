//! Retry policy configuration for outbound HTTP calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{deserialize_duration_from_ms, deserialize_duration_from_seconds};

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> Duration {
    Duration::from_millis(250)
}

fn default_max_backoff_secs() -> Duration {
    Duration::from_secs(10)
}

fn default_base_for_backoff() -> u32 {
    2
}

fn default_retry_after_cap_secs() -> Duration {
    Duration::from_secs(30)
}

/// Jitter applied to backoff delays between retries.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JitterSetting {
    /// No jitter; delays follow the exponential schedule exactly.
    None,
    /// Full jitter; each delay is randomized up to the scheduled value.
    #[default]
    Full,
}

/// Within-cycle retry policy for calls to upstream marketplace APIs.
///
/// Retries are bounded per call; a call that exhausts them gives up for the
/// current poll cycle and the next scheduled tick tries again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HttpRetryConfig {
    /// Maximum number of retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff schedule.
    #[serde(default = "default_base_for_backoff")]
    pub base_for_backoff: u32,

    /// Delay before the first retry.
    #[serde(
        default = "default_initial_backoff_ms",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub initial_backoff_ms: Duration,

    /// Upper bound on any single backoff delay.
    #[serde(
        default = "default_max_backoff_secs",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub max_backoff_secs: Duration,

    /// Jitter applied to each backoff delay.
    #[serde(default)]
    pub jitter: JitterSetting,

    /// Largest `Retry-After` hint that will be honored on a 429 response.
    /// Hints above this are treated as an ordinary transient failure.
    #[serde(
        default = "default_retry_after_cap_secs",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub retry_after_cap_secs: Duration,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_for_backoff: default_base_for_backoff(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            jitter: JitterSetting::default(),
            retry_after_cap_secs: default_retry_after_cap_secs(),
        }
    }
}
