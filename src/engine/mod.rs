//! The ingestion engine: per-collection polling, cross-source merging,
//! dedup and cooldown filtering.

pub mod cooldown;
pub mod dedup;
pub mod merger;
pub mod poller;

pub use cooldown::CooldownTracker;
pub use dedup::DedupStore;
pub use merger::{merge_cycle, MergeStats, SourceBatch};
pub use poller::{CollectionPoller, EmittedEvent};
