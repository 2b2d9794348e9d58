//! Bounded, persisted sets of already-reported activity identities.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use crate::{
    models::{is_valid_identity, ActivityKind, CollectionConfig},
    persistence::{KeyValueStore, PersistenceError},
};

fn state_key(collection_id: &str, kind: ActivityKind) -> String {
    format!("dedup:{}:{}", collection_id, kind.as_str())
}

/// A bounded set of identity strings in insertion order.
///
/// Eviction is strictly FIFO by insertion: membership alone makes an entry
/// "known"; recency of lookups is irrelevant.
#[derive(Debug)]
struct SeenSet {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
    dirty: bool,
}

impl SeenSet {
    fn from_entries(capacity: usize, entries: Vec<String>) -> (Self, usize) {
        let mut set = Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            dirty: false,
        };
        let total = entries.len();
        let mut kept = 0;
        for entry in entries {
            if is_valid_identity(&entry) {
                set.push(entry);
                kept += 1;
            }
        }
        let pruned = total - kept;
        // A pruned (or over-capacity) load rewrites the cleaned set on the
        // next flush.
        set.dirty = pruned > 0 || kept > set.order.len();
        (set, pruned)
    }

    fn push(&mut self, identity: String) {
        self.order.push_back(identity.clone());
        self.members.insert(identity);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }

    fn contains(&self, identity: &str) -> bool {
        self.members.contains(identity)
    }

    fn insert(&mut self, identity: &str) -> bool {
        if self.contains(identity) {
            return false;
        }
        self.push(identity.to_string());
        self.dirty = true;
        true
    }

    fn snapshot(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }
}

/// One collection's dedup state across all activity kinds, persisted through
/// a [`KeyValueStore`].
///
/// Owned exclusively by that collection's poller: lookups and inserts are
/// synchronous and in-memory, and [`DedupStore::flush`] persists mutated sets
/// in one batch at the end of a cycle. A flush failure leaves the affected
/// sets dirty so the next flush retries; it never fails the poll loop.
pub struct DedupStore<S> {
    store: Arc<S>,
    collection_id: String,
    sets: HashMap<ActivityKind, SeenSet>,
}

impl<S: KeyValueStore> DedupStore<S> {
    /// Loads the persisted identity sets for every activity kind, pruning
    /// entries that no longer match the identity format.
    pub async fn load(store: Arc<S>, collection: &CollectionConfig) -> Result<Self, PersistenceError> {
        let collection_id = collection.id().to_string();
        let mut sets = HashMap::new();

        for kind in ActivityKind::ALL {
            let key = state_key(&collection_id, kind);
            let entries: Vec<String> = store.get_json_state(&key).await?.unwrap_or_default();
            let loaded = entries.len();
            let (set, pruned) = SeenSet::from_entries(collection.max_known(kind), entries);
            if pruned > 0 {
                tracing::debug!(
                    collection = %collection_id,
                    kind = %kind,
                    pruned,
                    "Pruned malformed identities from persisted dedup set."
                );
            }
            tracing::debug!(
                collection = %collection_id,
                kind = %kind,
                loaded = loaded - pruned,
                "Loaded persisted dedup set."
            );
            sets.insert(kind, set);
        }

        Ok(Self { store, collection_id, sets })
    }

    /// Whether `identity` has already been recorded for `kind`.
    pub fn contains(&self, kind: ActivityKind, identity: &str) -> bool {
        self.sets.get(&kind).is_some_and(|set| set.contains(identity))
    }

    /// Records `identity` for `kind`, evicting the oldest entries if the set
    /// exceeds its capacity. Returns `false` when it was already present.
    pub fn add(&mut self, kind: ActivityKind, identity: &str) -> bool {
        match self.sets.get_mut(&kind) {
            Some(set) => set.insert(identity),
            None => false,
        }
    }

    /// Number of identities currently recorded for `kind`.
    pub fn len(&self, kind: ActivityKind) -> usize {
        self.sets.get(&kind).map_or(0, |set| set.order.len())
    }

    /// Whether any set has unpersisted mutations.
    pub fn is_dirty(&self) -> bool {
        self.sets.values().any(|set| set.dirty)
    }

    /// Persists every mutated set. Sets that fail to write stay dirty and are
    /// retried on the next flush.
    pub async fn flush(&mut self) -> Result<(), PersistenceError> {
        let mut last_error = None;

        for kind in ActivityKind::ALL {
            let Some(set) = self.sets.get_mut(&kind) else { continue };
            if !set.dirty {
                continue;
            }
            let key = state_key(&self.collection_id, kind);
            match self.store.set_json_state(&key, &set.snapshot()).await {
                Ok(()) => set.dirty = false,
                Err(e) => {
                    tracing::error!(
                        collection = %self.collection_id,
                        kind = %kind,
                        error = %e,
                        "Failed to persist dedup set; will retry on next flush."
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
