//! GET-JSON execution with classified failure outcomes.

use std::{sync::Arc, time::Duration};

use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

/// Classified outcome of an upstream call after bounded retries.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network failures, 5xx responses and rate limiting. The caller gives up
    /// for the current cycle; the next scheduled tick tries again.
    #[error("transient upstream failure: {0}")]
    Transient(String),

    /// Client-side rejections other than 429. Retrying the same request
    /// cannot succeed; the caller skips this source for the cycle.
    #[error("permanent upstream failure: {0}")]
    Permanent(String),
}

/// Executes GET-JSON calls against rate-limited upstream APIs.
///
/// The wrapped client's middleware already retries transient failures with
/// exponential backoff, so a 429 reaching this layer means those retries are
/// exhausted. If the response carries a `Retry-After` hint within the
/// configured cap, the hint is honored once with one extra attempt before
/// giving up for the cycle.
#[derive(Clone)]
pub struct RateLimitedClient {
    client: Arc<ClientWithMiddleware>,
    retry_after_cap: Duration,
}

impl RateLimitedClient {
    /// Creates a client over a pooled retrying HTTP client.
    pub fn new(client: Arc<ClientWithMiddleware>, retry_after_cap: Duration) -> Self {
        Self { client, retry_after_cap }
    }

    /// Fetches `url` and decodes the response body as JSON.
    pub async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<serde_json::Value, ClientError> {
        let mut honored_hint = false;

        loop {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            let response = request
                .send()
                .await
                .map_err(|e| ClientError::Transient(e.to_string()))?;

            let status = response.status();

            if status.is_success() {
                return response
                    .json()
                    .await
                    .map_err(|e| ClientError::Transient(format!("undecodable response body: {e}")));
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if !honored_hint {
                    if let Some(delay) =
                        retry_after_hint(&response).filter(|d| *d <= self.retry_after_cap)
                    {
                        honored_hint = true;
                        tracing::debug!(url, delay_secs = delay.as_secs(), "Honoring Retry-After hint.");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }
                return Err(ClientError::Transient(format!("rate limited by upstream ({status})")));
            }

            if status.is_client_error() {
                return Err(ClientError::Permanent(format!("upstream rejected request ({status})")));
            }

            return Err(ClientError::Transient(format!("upstream failure ({status})")));
        }
    }
}

fn retry_after_hint(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
