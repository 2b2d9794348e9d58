//! A thread-safe pool of HTTP clients, keyed by retry policy.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio::sync::RwLock;

use super::client::create_retryable_http_client;
use crate::config::HttpRetryConfig;

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// The underlying `reqwest::Client` could not be built.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// Creates and reuses HTTP clients for the services that need them.
///
/// Clients are keyed by their `HttpRetryConfig`, so callers with different
/// retry strategies get different, isolated clients while callers sharing a
/// policy share connections.
pub struct HttpClientPool {
    clients: Arc<RwLock<HashMap<String, Arc<ClientWithMiddleware>>>>,
}

impl HttpClientPool {
    /// Creates a new, empty pool.
    pub fn new() -> Self {
        Self { clients: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Returns the pooled client for `retry_policy`, creating it on first use.
    ///
    /// Uses a double-checked locking pattern so concurrent callers with the
    /// same policy end up sharing one client.
    pub async fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        let key = format!("{retry_policy:?}");

        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(Arc::clone(client));
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(&key) {
            return Ok(Arc::clone(client));
        }

        let base_client = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;

        let new_client = Arc::new(create_retryable_http_client(retry_policy, base_client));
        clients.insert(key, Arc::clone(&new_client));

        Ok(new_client)
    }

    /// Number of distinct clients currently pooled.
    #[cfg(test)]
    pub async fn active_client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pool_starts_empty() {
        let pool = HttpClientPool::new();
        assert_eq!(pool.active_client_count().await, 0);
    }

    #[tokio::test]
    async fn same_policy_shares_one_client() {
        let pool = HttpClientPool::new();
        let retry_config = HttpRetryConfig::default();

        let client1 = pool.get_or_create(&retry_config).await.unwrap();
        let client2 = pool.get_or_create(&retry_config).await.unwrap();

        assert!(Arc::ptr_eq(&client1, &client2));
        assert_eq!(pool.active_client_count().await, 1);
    }

    #[tokio::test]
    async fn different_policies_get_distinct_clients() {
        let pool = HttpClientPool::new();
        let config_a = HttpRetryConfig::default();
        let config_b = HttpRetryConfig { max_retries: 5, ..Default::default() };

        let client_a = pool.get_or_create(&config_a).await.unwrap();
        let client_b = pool.get_or_create(&config_b).await.unwrap();

        assert!(!Arc::ptr_eq(&client_a, &client_b));
        assert_eq!(pool.active_client_count().await, 2);
    }

    #[tokio::test]
    async fn concurrent_access_is_safe() {
        let pool = Arc::new(HttpClientPool::new());
        let retry_config = HttpRetryConfig::default();

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let pool = Arc::clone(&pool);
            let retry_config = retry_config.clone();
            tasks.push(tokio::spawn(async move {
                pool.get_or_create(&retry_config).await.unwrap();
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(pool.active_client_count().await, 1);
    }
}
