//! Cross-source merging and filtering for one poll cycle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{cooldown::CooldownTracker, dedup::DedupStore};
use crate::{
    models::{Activity, SourceId},
    persistence::KeyValueStore,
};

/// Everything one source returned for one collection's cycle. Batches are
/// merged in configured source order; that order breaks canonical-record
/// ties.
#[derive(Debug)]
pub struct SourceBatch {
    /// The provider that produced this batch.
    pub source: SourceId,
    /// Normalized records, as returned by the adapter.
    pub activities: Vec<Activity>,
}

/// Counters describing what one cycle's merge kept and dropped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Events that passed every filter and will be emitted.
    pub emitted: usize,
    /// Records dropped because another source reported the same identity in
    /// this cycle.
    pub cross_source_duplicates: usize,
    /// Records dropped because their identity was already recorded.
    pub already_known: usize,
    /// Records recorded as known but suppressed by an active cooldown.
    pub cooldown_suppressed: usize,
}

/// Whether `candidate` should replace `current` as the canonical record for
/// one identity: a record carrying a native price beats one without.
/// Otherwise the record already in place wins, which is the one from the
/// earlier-configured source, including when both carry divergent prices.
fn prefer_replacement(current: &Activity, candidate: &Activity) -> bool {
    candidate.price_native.is_some() && current.price_native.is_none()
}

/// Merges one cycle's batches into the events to emit, oldest first.
///
/// State mutations are applied in the same synchronous pass that selects the
/// emissions: an identity is recorded exactly when its event is emitted or
/// deliberately cooldown-suppressed, never otherwise. Cooldown-suppressed
/// events genuinely happened, so they are marked known but not emitted, and
/// they do not restart the token's window.
pub fn merge_cycle<S: KeyValueStore>(
    batches: Vec<SourceBatch>,
    dedup: &mut DedupStore<S>,
    cooldowns: &mut CooldownTracker,
    now: DateTime<Utc>,
) -> (Vec<Activity>, MergeStats) {
    let mut stats = MergeStats::default();

    // One canonical record per (tokenId, txHash), preferring richer data.
    let mut canonical: Vec<Activity> = Vec::new();
    let mut by_identity: HashMap<String, usize> = HashMap::new();

    for activity in batches.into_iter().flat_map(|batch| batch.activities) {
        let identity = activity.identity();
        match by_identity.get(&identity) {
            Some(&slot) => {
                stats.cross_source_duplicates += 1;
                if prefer_replacement(&canonical[slot], &activity) {
                    canonical[slot] = activity;
                }
            }
            None => {
                by_identity.insert(identity, canonical.len());
                canonical.push(activity);
            }
        }
    }

    // Oldest first, so downstream channels see a sensible timeline.
    canonical.sort_by_key(|activity| activity.timestamp);

    let mut emitted = Vec::new();
    for activity in canonical {
        let identity = activity.identity();

        if dedup.contains(activity.kind, &identity) {
            stats.already_known += 1;
            continue;
        }
        dedup.add(activity.kind, &identity);

        if cooldowns.is_on_cooldown(&activity.token_id, now) {
            stats.cooldown_suppressed += 1;
            tracing::debug!(
                token_id = %activity.token_id,
                tx_hash = %activity.tx_hash,
                "Token on cooldown; recording identity without emitting."
            );
            continue;
        }

        cooldowns.record_emission(&activity.token_id, now);
        emitted.push(activity);
    }

    stats.emitted = emitted.len();
    (emitted, stats)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use chrono::TimeZone;

    use super::*;
    use crate::{
        engine::dedup::DedupStore,
        models::ActivityKind,
        persistence::traits::MockKeyValueStore,
        test_helpers::{ActivityBuilder, CollectionBuilder},
    };

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    async fn empty_dedup(collection: &crate::models::CollectionConfig) -> DedupStore<MockKeyValueStore> {
        let mut store = MockKeyValueStore::new();
        store.expect_get_json_state::<Vec<String>>().returning(|_| Ok(None));
        DedupStore::load(Arc::new(store), collection).await.unwrap()
    }

    fn batch(source: SourceId, activities: Vec<Activity>) -> SourceBatch {
        SourceBatch { source, activities }
    }

    #[tokio::test]
    async fn same_payload_twice_emits_once() {
        let collection = CollectionBuilder::new("Test").build();
        let mut dedup = empty_dedup(&collection).await;
        let mut cooldowns = CooldownTracker::new(Duration::ZERO);

        let sale = ActivityBuilder::sale().token_id("42").tx_hash("0xaaa").build();

        let (first, stats) = merge_cycle(
            vec![batch(SourceId::MagicEden, vec![sale.clone()])],
            &mut dedup,
            &mut cooldowns,
            at(0),
        );
        assert_eq!(first.len(), 1);
        assert_eq!(stats.emitted, 1);

        let (second, stats) = merge_cycle(
            vec![batch(SourceId::MagicEden, vec![sale])],
            &mut dedup,
            &mut cooldowns,
            at(1),
        );
        assert!(second.is_empty());
        assert_eq!(stats.already_known, 1);
    }

    #[tokio::test]
    async fn cross_source_duplicate_keeps_the_priced_record() {
        let collection = CollectionBuilder::new("Test").build();
        let mut dedup = empty_dedup(&collection).await;
        let mut cooldowns = CooldownTracker::new(Duration::ZERO);

        let unpriced = ActivityBuilder::sale()
            .token_id("42")
            .tx_hash("0xaaa")
            .source(SourceId::MagicEden)
            .build();
        let priced = ActivityBuilder::sale()
            .token_id("42")
            .tx_hash("0xaaa")
            .price(1.5)
            .source(SourceId::OpenSea)
            .build();

        let (emitted, stats) = merge_cycle(
            vec![
                batch(SourceId::MagicEden, vec![unpriced]),
                batch(SourceId::OpenSea, vec![priced]),
            ],
            &mut dedup,
            &mut cooldowns,
            at(0),
        );

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].price_native, Some(1.5));
        assert_eq!(emitted[0].source, SourceId::OpenSea);
        assert_eq!(stats.cross_source_duplicates, 1);
    }

    #[tokio::test]
    async fn divergent_prices_resolve_to_the_first_configured_source() {
        let collection = CollectionBuilder::new("Test").build();
        let mut dedup = empty_dedup(&collection).await;
        let mut cooldowns = CooldownTracker::new(Duration::ZERO);

        let primary = ActivityBuilder::sale()
            .token_id("42")
            .tx_hash("0xaaa")
            .price(1.5)
            .source(SourceId::MagicEden)
            .build();
        let secondary = ActivityBuilder::sale()
            .token_id("42")
            .tx_hash("0xaaa")
            .price(1.6)
            .source(SourceId::OpenSea)
            .build();

        let (emitted, _) = merge_cycle(
            vec![
                batch(SourceId::MagicEden, vec![primary]),
                batch(SourceId::OpenSea, vec![secondary]),
            ],
            &mut dedup,
            &mut cooldowns,
            at(0),
        );

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].price_native, Some(1.5));
        assert_eq!(emitted[0].source, SourceId::MagicEden);
    }

    #[tokio::test]
    async fn cooldown_suppresses_but_still_marks_known() {
        let collection = CollectionBuilder::new("Test").build();
        let mut dedup = empty_dedup(&collection).await;
        let mut cooldowns = CooldownTracker::new(Duration::from_secs(60 * 60));

        let first = ActivityBuilder::sale().token_id("42").tx_hash("0xaaa").build();
        let (emitted, _) = merge_cycle(
            vec![batch(SourceId::MagicEden, vec![first])],
            &mut dedup,
            &mut cooldowns,
            at(0),
        );
        assert_eq!(emitted.len(), 1);

        // A distinct transaction for the same token within the window is
        // suppressed but recorded.
        let second = ActivityBuilder::sale().token_id("42").tx_hash("0xbbb").build();
        let (emitted, stats) = merge_cycle(
            vec![batch(SourceId::MagicEden, vec![second])],
            &mut dedup,
            &mut cooldowns,
            at(5),
        );
        assert!(emitted.is_empty());
        assert_eq!(stats.cooldown_suppressed, 1);
        assert!(dedup.contains(ActivityKind::Sale, "42-0xbbb"));

        // After the window elapses a third transaction is emitted. The
        // suppressed event did not restart the window.
        let third = ActivityBuilder::sale().token_id("42").tx_hash("0xccc").build();
        let (emitted, _) = merge_cycle(
            vec![batch(SourceId::MagicEden, vec![third])],
            &mut dedup,
            &mut cooldowns,
            at(61),
        );
        assert_eq!(emitted.len(), 1);
    }

    #[tokio::test]
    async fn emissions_are_chronological_within_a_cycle() {
        let collection = CollectionBuilder::new("Test").build();
        let mut dedup = empty_dedup(&collection).await;
        let mut cooldowns = CooldownTracker::new(Duration::ZERO);

        let newer = ActivityBuilder::sale()
            .token_id("2")
            .tx_hash("0xbbb")
            .timestamp(at(10))
            .build();
        let older = ActivityBuilder::sale()
            .token_id("1")
            .tx_hash("0xaaa")
            .timestamp(at(0))
            .build();

        // Adapters return most-recent-first.
        let (emitted, _) = merge_cycle(
            vec![batch(SourceId::MagicEden, vec![newer, older])],
            &mut dedup,
            &mut cooldowns,
            at(20),
        );

        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].token_id, "1");
        assert_eq!(emitted[1].token_id, "2");
    }

    #[tokio::test]
    async fn kinds_deduplicate_independently() {
        let collection = CollectionBuilder::new("Test").build();
        let mut dedup = empty_dedup(&collection).await;
        let mut cooldowns = CooldownTracker::new(Duration::ZERO);

        let mint = ActivityBuilder::new(ActivityKind::Mint).token_id("42").tx_hash("0xaaa").build();
        let burn = ActivityBuilder::new(ActivityKind::Burn).token_id("42").tx_hash("0xbbb").build();

        let (emitted, _) = merge_cycle(
            vec![batch(SourceId::MagicEden, vec![mint, burn])],
            &mut dedup,
            &mut cooldowns,
            at(0),
        );

        assert_eq!(emitted.len(), 2);
        assert!(dedup.contains(ActivityKind::Mint, "42-0xaaa"));
        assert!(dedup.contains(ActivityKind::Burn, "42-0xbbb"));
        assert!(!dedup.contains(ActivityKind::Sale, "42-0xaaa"));
    }
}
