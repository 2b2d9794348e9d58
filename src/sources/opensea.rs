//! OpenSea v2 events adapter (secondary source, sales only).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::traits::{ActivitySource, SourceError};
use crate::{
    http_client::RateLimitedClient,
    models::{Activity, ActivityKind, CollectionConfig, SourceId},
};

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    nft: Option<RawNft>,
    #[serde(default)]
    payment: Option<RawPayment>,
    #[serde(default)]
    seller: String,
    #[serde(default)]
    buyer: String,
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    event_timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawNft {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    display_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPayment {
    #[serde(default)]
    quantity: Option<String>,
    #[serde(default)]
    decimals: Option<u32>,
    #[serde(default)]
    symbol: Option<String>,
}

impl RawPayment {
    /// Decodes the base-unit quantity into a native-currency amount.
    fn native_price(&self) -> Option<f64> {
        let quantity = self.quantity.as_deref()?;
        if quantity == "0" {
            return None;
        }
        let amount: f64 = quantity.parse().ok()?;
        let decimals = self.decimals.unwrap_or(18);
        Some(amount / 10f64.powi(decimals as i32))
    }
}

/// Adapter for the OpenSea v2 collection events API.
///
/// OpenSea only feeds the sale stream; mints and burns come from the primary
/// source alone. Enabled per collection through `opensea_slug`.
pub struct OpenSeaSource {
    base_url: String,
    api_key: String,
    client: RateLimitedClient,
}

impl OpenSeaSource {
    /// Creates an adapter talking to the API at `base_url` with `api_key`.
    pub fn new(base_url: String, api_key: String, client: RateLimitedClient) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), api_key, client }
    }

    fn convert(&self, raw: RawEvent, collection: &CollectionConfig) -> Option<Activity> {
        let nft = raw.nft.as_ref()?;
        let Some(token_id) = nft.identifier.clone() else {
            tracing::warn!(
                collection = %collection.name,
                source = %SourceId::OpenSea,
                "Skipping sale event without a token identifier."
            );
            return None;
        };
        let Some(tx_hash) = raw.transaction.clone() else {
            tracing::warn!(
                collection = %collection.name,
                source = %SourceId::OpenSea,
                token_id,
                "Skipping sale event without a transaction hash."
            );
            return None;
        };
        let Some(timestamp) = raw.event_timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0))
        else {
            tracing::warn!(
                collection = %collection.name,
                source = %SourceId::OpenSea,
                token_id,
                "Skipping sale event without a usable timestamp."
            );
            return None;
        };

        let seller = raw.seller.to_lowercase();
        if !seller.is_empty() && seller == collection.zero_address {
            tracing::debug!(
                collection = %collection.name,
                token_id,
                "Dropping zero-address sale (mint signal)."
            );
            return None;
        }

        Some(Activity {
            kind: ActivityKind::Sale,
            token_id,
            tx_hash,
            from_address: seller,
            to_address: raw.buyer.to_lowercase(),
            price_native: raw.payment.as_ref().and_then(RawPayment::native_price),
            currency_symbol: raw.payment.as_ref().and_then(|p| p.symbol.clone()),
            token_name: nft.name.clone(),
            image_url: nft.image_url.clone().or_else(|| nft.display_image_url.clone()),
            timestamp,
            source: SourceId::OpenSea,
        })
    }
}

#[async_trait]
impl ActivitySource for OpenSeaSource {
    fn id(&self) -> SourceId {
        SourceId::OpenSea
    }

    fn supports(&self, kind: ActivityKind) -> bool {
        kind == ActivityKind::Sale
    }

    async fn fetch_activity(
        &self,
        collection: &CollectionConfig,
        kind: ActivityKind,
        limit: u32,
    ) -> Result<Vec<Activity>, SourceError> {
        if kind != ActivityKind::Sale {
            return Ok(Vec::new());
        }
        let Some(slug) = collection.opensea_slug.as_deref() else {
            return Err(SourceError::Permanent(format!(
                "collection '{}' has no OpenSea slug configured",
                collection.name
            )));
        };

        let url = format!(
            "{}/api/v2/events/collection/{}?limit={}&event_type=sale",
            self.base_url, slug, limit,
        );

        let body = self
            .client
            .get_json(&url, &[("accept", "application/json"), ("x-api-key", &self.api_key)])
            .await?;

        let records = body
            .get("asset_events")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let activities = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<RawEvent>(record) {
                Ok(raw) => self.convert(raw, collection),
                Err(e) => {
                    tracing::warn!(
                        collection = %collection.name,
                        source = %SourceId::OpenSea,
                        error = %e,
                        "Skipping undecodable sale event."
                    );
                    None
                }
            })
            .collect();

        Ok(activities)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::HttpRetryConfig, http_client::create_retryable_http_client,
        test_helpers::CollectionBuilder,
    };

    fn test_client(base_url: &str) -> OpenSeaSource {
        let config = HttpRetryConfig { max_retries: 0, ..Default::default() };
        let client = create_retryable_http_client(&config, reqwest::Client::new());
        OpenSeaSource::new(
            base_url.to_string(),
            "test-key".to_string(),
            RateLimitedClient::new(Arc::new(client), Duration::from_secs(1)),
        )
    }

    fn sale_event(token_id: &str, tx_hash: &str, quantity: &str) -> serde_json::Value {
        serde_json::json!({
            "nft": {
                "identifier": token_id,
                "name": format!("Token #{token_id}"),
                "image_url": "https://img.example/os.png"
            },
            "payment": { "quantity": quantity, "decimals": 18, "symbol": "ETH" },
            "seller": "0xAAAA000000000000000000000000000000000001",
            "buyer": "0xBBBB000000000000000000000000000000000002",
            "transaction": tx_hash,
            "event_timestamp": 1717243200
        })
    }

    #[tokio::test]
    async fn maps_sale_events_to_canonical_sales() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "asset_events": [sale_event("42", "0xaaa", "1500000000000000000")]
        });
        let mock = server
            .mock("GET", "/api/v2/events/collection/test-slug")
            .match_query(mockito::Matcher::Any)
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let source = test_client(&server.url());
        let collection = CollectionBuilder::new("Test").opensea_slug("test-slug").build();
        let activities =
            source.fetch_activity(&collection, ActivityKind::Sale, 50).await.unwrap();

        assert_eq!(activities.len(), 1);
        let sale = &activities[0];
        assert_eq!(sale.kind, ActivityKind::Sale);
        assert_eq!(sale.token_id, "42");
        assert_eq!(sale.tx_hash, "0xaaa");
        assert_eq!(sale.price_native, Some(1.5));
        assert_eq!(sale.from_address, "0xaaaa000000000000000000000000000000000001");
        assert_eq!(sale.source, SourceId::OpenSea);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn zero_quantity_means_no_price() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({ "asset_events": [sale_event("1", "0xbbb", "0")] });
        let _mock = server
            .mock("GET", "/api/v2/events/collection/test-slug")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let source = test_client(&server.url());
        let collection = CollectionBuilder::new("Test").opensea_slug("test-slug").build();
        let activities =
            source.fetch_activity(&collection, ActivityKind::Sale, 50).await.unwrap();

        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].price_native, None);
    }

    #[tokio::test]
    async fn non_sale_kinds_return_empty() {
        let server = mockito::Server::new_async().await;
        let source = test_client(&server.url());
        let collection = CollectionBuilder::new("Test").opensea_slug("test-slug").build();

        let activities =
            source.fetch_activity(&collection, ActivityKind::Mint, 50).await.unwrap();
        assert!(activities.is_empty());
        assert!(!source.supports(ActivityKind::Burn));
        assert!(source.supports(ActivityKind::Sale));
    }

    #[tokio::test]
    async fn missing_slug_is_a_permanent_error() {
        let server = mockito::Server::new_async().await;
        let source = test_client(&server.url());
        let collection = CollectionBuilder::new("Test").build();

        let err =
            source.fetch_activity(&collection, ActivityKind::Sale, 50).await.unwrap_err();
        assert!(matches!(err, SourceError::Permanent(_)));
    }

    #[tokio::test]
    async fn events_without_nft_data_are_skipped() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "asset_events": [
                { "seller": "0xAAAA000000000000000000000000000000000001", "transaction": "0xccc" },
                sale_event("2", "0xddd", "1000000000000000000"),
            ]
        });
        let _mock = server
            .mock("GET", "/api/v2/events/collection/test-slug")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let source = test_client(&server.url());
        let collection = CollectionBuilder::new("Test").opensea_slug("test-slug").build();
        let activities =
            source.fetch_activity(&collection, ActivityKind::Sale, 50).await.unwrap();

        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].token_id, "2");
    }
}
