//! Outbound HTTP plumbing shared by the source adapters and the notifier.
//!
//! Transient failures (network errors, 5xx, 429) are retried within a cycle
//! by the retry middleware, with exponential backoff and bounded attempts.
//! [`RateLimitedClient`] layers on top of that: it classifies terminal
//! outcomes into transient vs permanent and honors a `Retry-After` hint on a
//! terminal 429.

mod client;
mod pool;
mod rate_limited;

pub use client::create_retryable_http_client;
pub use pool::{HttpClientPool, HttpClientPoolError};
pub use rate_limited::{ClientError, RateLimitedClient};
