#![warn(missing_docs)]
//! Tokenwatch ingests on-chain NFT activity (sales, mints, burns) for many
//! collections from multiple marketplace APIs, deduplicates and rate-limits
//! it, and emits a normalized stream of activity events to a notifier.

pub mod config;
pub mod engine;
pub mod http_client;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod sources;
pub mod supervisor;
pub mod test_helpers;
