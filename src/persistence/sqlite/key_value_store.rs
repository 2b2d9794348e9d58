//! `KeyValueStore` implementation for `SqliteStateRepository`.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::persistence::{
    error::PersistenceError, sqlite::SqliteStateRepository, traits::KeyValueStore,
};

#[async_trait]
impl KeyValueStore for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_json_state<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        key: &str,
    ) -> Result<Option<T>, PersistenceError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM ingest_state WHERE key = ?")
                .bind(key)
                .fetch_optional(self.pool())
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, key, "Failed to read JSON state.");
                    PersistenceError::OperationFailed(e.to_string())
                })?;

        match value {
            Some(value) => serde_json::from_str(&value)
                .map(Some)
                .map_err(|e| PersistenceError::SerializationError(e.to_string())),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, value), level = "debug")]
    async fn set_json_state<T: Serialize + Send + Sync + 'static>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), PersistenceError> {
        let value_str = serde_json::to_string(value)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

        sqlx::query("INSERT OR REPLACE INTO ingest_state (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value_str)
            .execute(self.pool())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key, "Failed to write JSON state.");
                PersistenceError::OperationFailed(e.to_string())
            })?;

        Ok(())
    }
}
