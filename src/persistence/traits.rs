//! Persistence interfaces consumed by the ingestion engine.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{de::DeserializeOwned, Serialize};

use super::error::PersistenceError;

/// A durable JSON key-value store.
///
/// Dedup identity sets are persisted through this interface under
/// per-collection, per-kind keys, so concurrent flushes from different
/// collections never touch the same key.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieves a JSON state object by key, or `None` if absent.
    async fn get_json_state<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        key: &str,
    ) -> Result<Option<T>, PersistenceError>;

    /// Inserts or replaces a JSON state object by key.
    async fn set_json_state<T: Serialize + Send + Sync + 'static>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), PersistenceError>;
}
