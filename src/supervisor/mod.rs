//! The Supervisor owns the application's long-running tasks.
//!
//! One poller task per monitored collection plus a single dispatch loop that
//! serializes delivery through the notifier. The supervisor starts them,
//! watches their health, and orchestrates a bounded graceful shutdown in
//! which in-flight dedup flushes get to complete. A collection task that
//! dies is logged and left dead; the other collections' schedules are never
//! disturbed by it.

mod builder;

pub use builder::SupervisorBuilder;

use std::sync::Arc;

use thiserror::Error;
use tokio::{signal, sync::mpsc};

use crate::{
    config::AppConfig,
    engine::{CollectionPoller, DedupStore, EmittedEvent},
    models::CollectionConfig,
    notification::Notifier,
    persistence::{KeyValueStore, PersistenceError},
    sources::ActivitySource,
};

/// Errors that can occur while assembling or running the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// No configuration was provided to the builder.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// No state repository was provided to the builder.
    #[error("Missing state repository for Supervisor")]
    MissingStateRepository,

    /// No primary activity source was provided to the builder.
    #[error("Missing primary activity source for Supervisor")]
    MissingPrimarySource,

    /// No notifier was provided to the builder.
    #[error("Missing notifier for Supervisor")]
    MissingNotifier,

    /// No collections were provided to the builder.
    #[error("No collections configured")]
    NoCollections,

    /// Persisted dedup state could not be loaded at startup.
    #[error("Failed to load persisted state: {0}")]
    StateLoad(#[from] PersistenceError),
}

/// The primary runtime manager: owns every collection's poller and the
/// notification dispatch loop.
pub struct Supervisor<S: KeyValueStore + 'static> {
    config: Arc<AppConfig>,
    state: Arc<S>,
    collections: Vec<Arc<CollectionConfig>>,
    primary_source: Arc<dyn ActivitySource>,
    secondary_source: Option<Arc<dyn ActivitySource>>,
    notifier: Arc<dyn Notifier>,
    cancellation_token: tokio_util::sync::CancellationToken,
    join_set: tokio::task::JoinSet<()>,
}

impl<S: KeyValueStore + Send + Sync + 'static> Supervisor<S> {
    /// Returns a new [`SupervisorBuilder`].
    pub fn builder() -> SupervisorBuilder<S> {
        SupervisorBuilder::new()
    }

    /// The sources a collection polls, in priority order. The secondary
    /// source joins only for collections that configure a provider id for
    /// it.
    fn sources_for(&self, collection: &CollectionConfig) -> Vec<Arc<dyn ActivitySource>> {
        let mut sources = vec![Arc::clone(&self.primary_source)];
        if collection.opensea_slug.is_some() {
            if let Some(secondary) = &self.secondary_source {
                sources.push(Arc::clone(secondary));
            }
        }
        sources
    }

    /// Starts all services and runs until shutdown.
    ///
    /// Spawns the signal handler, loads each collection's persisted dedup
    /// state, spawns one poller per collection and the dispatch loop, then
    /// supervises task health until a shutdown signal arrives. Shutdown
    /// cancels the shared token and waits up to the configured timeout for
    /// pollers to finish their final flushes.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let cancellation_token = self.cancellation_token.clone();

        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = cancellation_token.cancelled() => {}
            }

            cancellation_token.cancel();
        });

        let (events_tx, mut events_rx) =
            mpsc::channel::<EmittedEvent>(self.config.notification_channel_capacity as usize);

        for collection in &self.collections {
            let sources = self.sources_for(collection);
            let dedup = DedupStore::load(Arc::clone(&self.state), collection).await?;
            let poller = CollectionPoller::new(
                Arc::clone(collection),
                sources,
                dedup,
                events_tx.clone(),
                self.cancellation_token.clone(),
            );
            self.join_set.spawn(async move {
                poller.run().await;
            });
        }
        // Pollers hold the only remaining senders, so the dispatch loop ends
        // once every poller has shut down.
        drop(events_tx);

        let notifier = Arc::clone(&self.notifier);
        self.join_set.spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if let Err(e) = notifier.notify(&event.collection, &event.activity).await {
                    tracing::error!(
                        collection = %event.collection.name,
                        kind = %event.activity.kind,
                        token_id = %event.activity.token_id,
                        error = %e,
                        "Failed to deliver notification."
                    );
                }
            }
            tracing::info!("Event dispatcher has shut down.");
        });

        tracing::info!(
            collections = self.collections.len(),
            "Supervisor started; monitoring collections."
        );

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(())) => {
                            // A task finished cleanly; keep supervising the rest.
                        }
                        Some(Err(e)) => {
                            // One collection's task died. Its schedule is lost
                            // until restart, but nothing here may disturb the
                            // other collections.
                            tracing::error!(
                                error = ?e,
                                "A supervised task terminated abnormally; other collections continue."
                            );
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        // Give in-flight cycles and their final flushes a bounded window.
        let shutdown_timeout = self.config.shutdown_timeout;
        let drain = async {
            while self.join_set.join_next().await.is_some() {}
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Tasks did not finish within the shutdown timeout; aborting the rest."
            );
            self.join_set.shutdown().await;
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}
