//! Core data types shared across the ingestion engine.

pub mod activity;
pub mod collection;

pub use activity::{is_valid_identity, Activity, ActivityKind, SourceId};
pub use collection::{BurnMessage, CollectionConfig};
