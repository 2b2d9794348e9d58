//! Delivery of emitted activity to downstream channels.

mod discord;
mod stdout;

pub use discord::DiscordWebhookNotifier;
pub use stdout::StdoutNotifier;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::models::{Activity, CollectionConfig};

/// Errors produced while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// The downstream endpoint could not be reached or rejected the post.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Downstream consumer of emitted activity.
///
/// Called once per emitted event, in chronological order per cycle. Delivery
/// failures are the notifier's concern: the engine logs them and never rolls
/// back dedup or cooldown state, so a failed post is not retried by the core.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one emitted activity for a collection.
    async fn notify(
        &self,
        collection: &CollectionConfig,
        activity: &Activity,
    ) -> Result<(), NotifierError>;
}
