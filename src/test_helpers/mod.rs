//! Shared builders and stubs for unit and integration tests.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    models::{Activity, ActivityKind, BurnMessage, CollectionConfig, SourceId},
    notification::{Notifier, NotifierError},
    persistence::{KeyValueStore, PersistenceError},
};

/// Builder for [`CollectionConfig`] values with sensible test defaults.
pub struct CollectionBuilder {
    config: CollectionConfig,
}

impl CollectionBuilder {
    /// Starts a collection named `name` with default tunables.
    pub fn new(name: &str) -> Self {
        Self {
            config: CollectionConfig {
                name: name.to_string(),
                chain: "ethereum".to_string(),
                contract_address: "0x1111111111111111111111111111111111111111".to_string(),
                opensea_slug: None,
                poll_interval_secs: Duration::from_secs(60),
                activity_limit: 50,
                sales_limit: 50,
                max_known_sales: 50,
                max_known_mints: 100,
                max_known_burns: 100,
                id_cooldown_minutes: Duration::from_secs(60 * 60),
                zero_address: "0x0000000000000000000000000000000000000000".to_string(),
                transaction_link_base: "https://abscan.org/tx/".to_string(),
                sales_webhook_url: None,
                mint_webhook_url: None,
                burn_webhook_url: None,
                burn_messages: Vec::new(),
            },
        }
    }

    /// Sets the contract address.
    pub fn contract_address(mut self, address: &str) -> Self {
        self.config.contract_address = address.to_string();
        self
    }

    /// Sets the OpenSea slug, enabling the secondary source.
    pub fn opensea_slug(mut self, slug: &str) -> Self {
        self.config.opensea_slug = Some(slug.to_string());
        self
    }

    /// Sets the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_secs = interval;
        self
    }

    /// Sets the seen-sales capacity.
    pub fn max_known_sales(mut self, capacity: usize) -> Self {
        self.config.max_known_sales = capacity;
        self
    }

    /// Sets the cooldown window.
    pub fn cooldown(mut self, window: Duration) -> Self {
        self.config.id_cooldown_minutes = window;
        self
    }

    /// Sets the sales webhook URL.
    pub fn sales_webhook_url(mut self, url: &str) -> Self {
        self.config.sales_webhook_url = Some(url.to_string());
        self
    }

    /// Appends a weighted burn message.
    pub fn burn_message(mut self, weight: f64, message: &str) -> Self {
        self.config.burn_messages.push(BurnMessage { weight, message: message.to_string() });
        self
    }

    /// Builds the normalized collection.
    pub fn build(self) -> CollectionConfig {
        self.config.normalize()
    }
}

/// Builder for [`Activity`] records with sensible test defaults.
pub struct ActivityBuilder {
    activity: Activity,
}

impl ActivityBuilder {
    /// Starts an activity of the given kind.
    pub fn new(kind: ActivityKind) -> Self {
        Self {
            activity: Activity {
                kind,
                token_id: "1".to_string(),
                tx_hash: "0xaaa".to_string(),
                from_address: "0xaaaa000000000000000000000000000000000001".to_string(),
                to_address: "0xbbbb000000000000000000000000000000000002".to_string(),
                price_native: None,
                currency_symbol: None,
                token_name: None,
                image_url: None,
                timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
                source: SourceId::MagicEden,
            },
        }
    }

    /// Starts a sale activity.
    pub fn sale() -> Self {
        Self::new(ActivityKind::Sale)
    }

    /// Sets the token id.
    pub fn token_id(mut self, token_id: &str) -> Self {
        self.activity.token_id = token_id.to_string();
        self
    }

    /// Sets the transaction hash.
    pub fn tx_hash(mut self, tx_hash: &str) -> Self {
        self.activity.tx_hash = tx_hash.to_string();
        self
    }

    /// Sets the native price.
    pub fn price(mut self, price: f64) -> Self {
        self.activity.price_native = Some(price);
        self
    }

    /// Sets the currency symbol.
    pub fn currency_symbol(mut self, symbol: &str) -> Self {
        self.activity.currency_symbol = Some(symbol.to_string());
        self
    }

    /// Sets the token display name.
    pub fn token_name(mut self, name: &str) -> Self {
        self.activity.token_name = Some(name.to_string());
        self
    }

    /// Sets the image URL.
    pub fn image_url(mut self, url: &str) -> Self {
        self.activity.image_url = Some(url.to_string());
        self
    }

    /// Sets the on-chain timestamp.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.activity.timestamp = timestamp;
        self
    }

    /// Sets the reporting source.
    pub fn source(mut self, source: SourceId) -> Self {
        self.activity.source = source;
        self
    }

    /// Builds the activity.
    pub fn build(self) -> Activity {
        self.activity
    }
}

/// A [`KeyValueStore`] keeping state in memory, with a switch to simulate
/// write failures.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, serde_json::Value>>,
    fail_writes: Mutex<bool>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_json_state<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        key: &str,
    ) -> Result<Option<T>, PersistenceError> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| PersistenceError::SerializationError(e.to_string())),
            None => Ok(None),
        }
    }

    async fn set_json_state<T: Serialize + Send + Sync + 'static>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), PersistenceError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(PersistenceError::OperationFailed("write failure injected".to_string()));
        }
        let value = serde_json::to_value(value)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

/// A [`Notifier`] that records every delivered event.
#[derive(Debug, Default)]
pub struct CapturingNotifier {
    delivered: Mutex<Vec<(String, Activity)>>,
}

impl CapturingNotifier {
    /// Creates an empty capturing notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, as `(collection name, activity)` pairs.
    pub fn delivered(&self) -> Vec<(String, Activity)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn notify(
        &self,
        collection: &CollectionConfig,
        activity: &Activity,
    ) -> Result<(), NotifierError> {
        self.delivered.lock().unwrap().push((collection.name.clone(), activity.clone()));
        Ok(())
    }
}
