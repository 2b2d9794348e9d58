//! Static per-collection configuration.

use std::time::Duration;

use serde::Deserialize;

use super::activity::{ActivityKind, SourceId};
use crate::config::{deserialize_duration_from_minutes, deserialize_duration_from_seconds};

fn default_chain() -> String {
    "ethereum".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_activity_limit() -> u32 {
    50
}

fn default_sales_limit() -> u32 {
    50
}

fn default_max_known_sales() -> usize {
    50
}

fn default_max_known_mints() -> usize {
    100
}

fn default_max_known_burns() -> usize {
    100
}

fn default_cooldown() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_zero_address() -> String {
    "0x0000000000000000000000000000000000000000".to_string()
}

fn default_transaction_link_base() -> String {
    "https://abscan.org/tx/".to_string()
}

/// One weighted entry in a collection's burn-message table. Weights are
/// expected to sum to roughly 1.0; the last entry is the fallback.
#[derive(Debug, Clone, Deserialize)]
pub struct BurnMessage {
    /// Probability mass of this message.
    pub weight: f64,
    /// Message template; `{tokenName}` is substituted at delivery time.
    pub message: String,
}

/// Static configuration for one monitored collection.
///
/// Loaded once at startup and immutable afterwards; each collection's poller
/// exclusively owns one instance for the process lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    /// Human-readable collection name, used in logs and notifications.
    pub name: String,

    /// Chain identifier understood by the upstream providers.
    #[serde(default = "default_chain")]
    pub chain: String,

    /// Contract address of the collection; lowercased form is the canonical
    /// collection id.
    pub contract_address: String,

    /// OpenSea collection slug. The secondary source is enabled for this
    /// collection only when set.
    #[serde(default)]
    pub opensea_slug: Option<String>,

    /// How often to poll this collection.
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub poll_interval_secs: Duration,

    /// Fetch limit for the primary activity feed.
    #[serde(default = "default_activity_limit")]
    pub activity_limit: u32,

    /// Fetch limit for the secondary sales feed.
    #[serde(default = "default_sales_limit")]
    pub sales_limit: u32,

    /// Capacity of the persisted seen-sales set.
    #[serde(default = "default_max_known_sales")]
    pub max_known_sales: usize,

    /// Capacity of the persisted seen-mints set.
    #[serde(default = "default_max_known_mints")]
    pub max_known_mints: usize,

    /// Capacity of the persisted seen-burns set.
    #[serde(default = "default_max_known_burns")]
    pub max_known_burns: usize,

    /// Suppression window applied per token after an emission.
    #[serde(
        default = "default_cooldown",
        deserialize_with = "deserialize_duration_from_minutes"
    )]
    pub id_cooldown_minutes: Duration,

    /// Address treated as the mint/burn sentinel by the providers.
    #[serde(default = "default_zero_address")]
    pub zero_address: String,

    /// Base URL for transaction explorer links in notifications.
    #[serde(default = "default_transaction_link_base")]
    pub transaction_link_base: String,

    /// Webhook target for sale notifications. Events without a target are
    /// still deduplicated and recorded, just not delivered.
    #[serde(default)]
    pub sales_webhook_url: Option<String>,

    /// Webhook target for mint notifications.
    #[serde(default)]
    pub mint_webhook_url: Option<String>,

    /// Webhook target for burn notifications.
    #[serde(default)]
    pub burn_webhook_url: Option<String>,

    /// Weighted message table for burn notifications.
    #[serde(default)]
    pub burn_messages: Vec<BurnMessage>,
}

impl CollectionConfig {
    /// Canonical collection identifier: the lowercased contract address.
    pub fn id(&self) -> &str {
        &self.contract_address
    }

    /// Lowercases the address fields so identity comparisons are exact.
    pub fn normalize(mut self) -> Self {
        self.contract_address = self.contract_address.to_lowercase();
        self.zero_address = self.zero_address.to_lowercase();
        self
    }

    /// Capacity of the persisted seen set for one activity kind.
    pub fn max_known(&self, kind: ActivityKind) -> usize {
        match kind {
            ActivityKind::Sale => self.max_known_sales,
            ActivityKind::Mint => self.max_known_mints,
            ActivityKind::Burn => self.max_known_burns,
        }
    }

    /// Fetch limit for one source's feed.
    pub fn fetch_limit(&self, source: SourceId) -> u32 {
        match source {
            SourceId::MagicEden => self.activity_limit,
            SourceId::OpenSea => self.sales_limit,
        }
    }

    /// The configured webhook target for one activity kind, if any.
    pub fn webhook_for(&self, kind: ActivityKind) -> Option<&str> {
        match kind {
            ActivityKind::Sale => self.sales_webhook_url.as_deref(),
            ActivityKind::Mint => self.mint_webhook_url.as_deref(),
            ActivityKind::Burn => self.burn_webhook_url.as_deref(),
        }
    }
}
