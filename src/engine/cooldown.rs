//! Token-level emission suppression, independent of dedup.

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};

/// Tracks the last emission time per token for one collection.
///
/// A token that emitted within the configured window is suppressed even when
/// a new, distinct transaction surfaces for it. This layers after dedup, it
/// does not replace it. State is in-memory only and rebuilt empty on restart;
/// expired entries are overwritten lazily, never swept.
#[derive(Debug)]
pub struct CooldownTracker {
    window: Duration,
    last_emitted: HashMap<String, DateTime<Utc>>,
}

impl CooldownTracker {
    /// Creates a tracker with the given suppression window.
    pub fn new(window: Duration) -> Self {
        Self { window, last_emitted: HashMap::new() }
    }

    /// Whether `token_id` emitted within the window as of `now`.
    pub fn is_on_cooldown(&self, token_id: &str, now: DateTime<Utc>) -> bool {
        if self.window.is_zero() {
            return false;
        }
        match self.last_emitted.get(token_id) {
            // A last-emitted time in the future (clock skew) still counts as
            // within the window.
            Some(last) => match now.signed_duration_since(*last).to_std() {
                Ok(elapsed) => elapsed < self.window,
                Err(_) => true,
            },
            None => false,
        }
    }

    /// Records an emission for `token_id` at `now`, starting a new window.
    pub fn record_emission(&mut self, token_id: &str, now: DateTime<Utc>) {
        self.last_emitted.insert(token_id.to_string(), now);
    }

    /// Number of tokens currently tracked.
    pub fn tracked_tokens(&self) -> usize {
        self.last_emitted.len()
    }
}
