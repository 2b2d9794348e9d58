//! Per-collection polling scheduler.

use std::sync::Arc;

use futures::future::join_all;
use tokio::{
    sync::mpsc,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{
    cooldown::CooldownTracker,
    dedup::DedupStore,
    merger::{merge_cycle, MergeStats, SourceBatch},
};
use crate::{
    models::{Activity, ActivityKind, CollectionConfig},
    persistence::KeyValueStore,
    sources::{ActivitySource, SourceError},
};

/// An event that survived merging and is ready for delivery.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    /// The collection the event belongs to.
    pub collection: Arc<CollectionConfig>,
    /// The canonical activity record.
    pub activity: Activity,
}

/// Runs one collection's poll-fetch-merge-emit loop.
///
/// Each poller owns its collection's dedup and cooldown state outright, so no
/// locking is needed: only one cycle is ever in flight per collection because
/// the loop awaits the cycle before taking the next tick. Scheduling is
/// fixed-interval: a slow cycle does not push later ticks out, and ticks
/// that would overlap a running cycle are skipped with a warning.
pub struct CollectionPoller<S> {
    collection: Arc<CollectionConfig>,
    sources: Vec<Arc<dyn ActivitySource>>,
    dedup: DedupStore<S>,
    cooldowns: CooldownTracker,
    events_tx: mpsc::Sender<EmittedEvent>,
    cancellation_token: CancellationToken,
}

impl<S: KeyValueStore> CollectionPoller<S> {
    /// Creates a poller over a loaded [`DedupStore`]. Sources are consulted
    /// in the order given; that order decides cross-source ties.
    pub fn new(
        collection: Arc<CollectionConfig>,
        sources: Vec<Arc<dyn ActivitySource>>,
        dedup: DedupStore<S>,
        events_tx: mpsc::Sender<EmittedEvent>,
        cancellation_token: CancellationToken,
    ) -> Self {
        let cooldowns = CooldownTracker::new(collection.id_cooldown_minutes);
        Self { collection, sources, dedup, cooldowns, events_tx, cancellation_token }
    }

    /// Runs until cancellation, then flushes dedup state before exiting.
    pub async fn run(mut self) {
        let poll_interval = self.collection.poll_interval_secs;
        let cancellation_token = self.cancellation_token.clone();
        let mut ticks = interval(poll_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            collection = %self.collection.name,
            interval_secs = poll_interval.as_secs(),
            sources = self.sources.len(),
            "Collection poller started."
        );

        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    tracing::info!(
                        collection = %self.collection.name,
                        "Poller cancellation signal received, shutting down..."
                    );
                    break;
                }

                _ = ticks.tick() => {
                    let started = tokio::time::Instant::now();
                    self.poll_cycle().await;
                    if started.elapsed() >= poll_interval {
                        tracing::warn!(
                            collection = %self.collection.name,
                            elapsed_secs = started.elapsed().as_secs(),
                            "Poll cycle overran its interval; missed ticks are skipped."
                        );
                    }
                }
            }
        }

        // Identities recorded by an in-flight cycle must reach durable
        // storage before exit; losing them means a duplicate repost.
        if let Err(e) = self.dedup.flush().await {
            tracing::error!(
                collection = %self.collection.name,
                error = %e,
                "Failed to flush dedup state during shutdown."
            );
        }
        tracing::info!(collection = %self.collection.name, "Collection poller has shut down.");
    }

    /// One poll-fetch-merge-emit cycle. Failures are contained here: a source
    /// error degrades that source to an empty batch, a flush error is retried
    /// next cycle, and nothing propagates to other collections.
    async fn poll_cycle(&mut self) {
        let now = chrono::Utc::now();

        let mut fetches = Vec::new();
        for source in &self.sources {
            for kind in ActivityKind::ALL {
                if !source.supports(kind) {
                    continue;
                }
                let source = Arc::clone(source);
                let collection = Arc::clone(&self.collection);
                fetches.push(async move {
                    let limit = collection.fetch_limit(source.id());
                    let activities = match source.fetch_activity(&collection, kind, limit).await {
                        Ok(activities) => activities,
                        Err(SourceError::Permanent(e)) => {
                            tracing::warn!(
                                collection = %collection.name,
                                source = %source.id(),
                                kind = %kind,
                                error = %e,
                                "Source rejected the request; skipping it for this cycle."
                            );
                            Vec::new()
                        }
                        Err(SourceError::Transient(e)) => {
                            tracing::warn!(
                                collection = %collection.name,
                                source = %source.id(),
                                kind = %kind,
                                error = %e,
                                "Source unavailable; skipping it for this cycle."
                            );
                            Vec::new()
                        }
                    };
                    SourceBatch { source: source.id(), activities }
                });
            }
        }

        // Fetches run concurrently; results come back in source-priority
        // order, which the merger relies on for tie-breaking.
        let batches = join_all(fetches).await;

        let (events, stats) =
            merge_cycle(batches, &mut self.dedup, &mut self.cooldowns, now);

        if stats != MergeStats::default() {
            tracing::debug!(
                collection = %self.collection.name,
                emitted = stats.emitted,
                cross_source_duplicates = stats.cross_source_duplicates,
                already_known = stats.already_known,
                cooldown_suppressed = stats.cooldown_suppressed,
                "Poll cycle merge complete."
            );
        }

        for activity in events {
            tracing::info!(
                collection = %self.collection.name,
                kind = %activity.kind,
                token_id = %activity.token_id,
                tx_hash = %activity.tx_hash,
                source = %activity.source,
                "Activity emitted."
            );
            let event = EmittedEvent { collection: Arc::clone(&self.collection), activity };
            if self.events_tx.send(event).await.is_err() {
                tracing::warn!(
                    collection = %self.collection.name,
                    "Event channel closed; dropping remaining emissions."
                );
                break;
            }
        }

        if let Err(e) = self.dedup.flush().await {
            tracing::error!(
                collection = %self.collection.name,
                error = %e,
                "Failed to persist dedup state; will retry next cycle."
            );
        }
    }
}
