//! The interface every upstream activity provider implements.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::{
    http_client::ClientError,
    models::{Activity, ActivityKind, CollectionConfig, SourceId},
};

/// Errors surfaced by a source adapter for one fetch.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A retryable upstream condition that survived bounded retries. The
    /// cycle gives up on this source; the next scheduled tick tries again.
    #[error("transient source failure: {0}")]
    Transient(String),

    /// Misconfiguration or a rejected request. Retrying the same call cannot
    /// succeed; the caller logs and skips this source for the cycle.
    #[error("permanent source failure: {0}")]
    Permanent(String),
}

impl From<ClientError> for SourceError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transient(msg) => SourceError::Transient(msg),
            ClientError::Permanent(msg) => SourceError::Permanent(msg),
        }
    }
}

/// A provider-specific translator from raw API payloads to canonical
/// [`Activity`] records.
///
/// Adapters skip individually malformed records with a warning rather than
/// failing the batch, and resolve the provider's event taxonomy into the
/// canonical kind (including dropping zero-address trades that are really
/// mint signals).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Which provider this adapter speaks for.
    fn id(&self) -> SourceId;

    /// Whether the provider reports this activity kind at all.
    fn supports(&self, kind: ActivityKind) -> bool;

    /// Fetches the most recent activity of one kind for a collection,
    /// most-recent-first.
    async fn fetch_activity(
        &self,
        collection: &CollectionConfig,
        kind: ActivityKind,
        limit: u32,
    ) -> Result<Vec<Activity>, SourceError>;
}
