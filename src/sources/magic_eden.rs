//! Magic Eden v4 activity adapter (primary source).
//!
//! One endpoint reports trades, mints and burns for a collection. Mints also
//! surface as zero-address trades in the TRADE feed, so the sale mapping
//! drops records whose seller is the configured zero address.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::traits::{ActivitySource, SourceError};
use crate::{
    http_client::RateLimitedClient,
    models::{Activity, ActivityKind, CollectionConfig, SourceId},
};

fn wire_activity_type(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Sale => "TRADE",
        ActivityKind::Mint => "MINT",
        ActivityKind::Burn => "BURN",
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawActivity {
    #[serde(default)]
    activity_type: String,
    #[serde(default)]
    asset: Option<RawAsset>,
    #[serde(default)]
    transaction_info: Option<RawTransactionInfo>,
    #[serde(default)]
    from_address: String,
    #[serde(default)]
    to_address: String,
    #[serde(default)]
    unit_price: Option<RawUnitPrice>,
    #[serde(default)]
    timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAsset {
    #[serde(default)]
    token_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    media_v2: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    #[serde(default)]
    main: Option<RawMediaMain>,
}

#[derive(Debug, Deserialize)]
struct RawMediaMain {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransactionInfo {
    #[serde(default)]
    transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUnitPrice {
    #[serde(default)]
    amount: Option<RawAmount>,
    #[serde(default)]
    currency: Option<RawCurrency>,
}

#[derive(Debug, Deserialize)]
struct RawAmount {
    #[serde(default)]
    native: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawCurrency {
    #[serde(default)]
    symbol: Option<String>,
}

fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Adapter for the Magic Eden v4 activity API.
pub struct MagicEdenSource {
    base_url: String,
    client: RateLimitedClient,
}

impl MagicEdenSource {
    /// Creates an adapter talking to the API at `base_url`.
    pub fn new(base_url: String, client: RateLimitedClient) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), client }
    }

    fn convert(
        &self,
        raw: RawActivity,
        collection: &CollectionConfig,
        kind: ActivityKind,
    ) -> Option<Activity> {
        if raw.activity_type != wire_activity_type(kind) {
            return None;
        }

        let asset = raw.asset.as_ref()?;
        let Some(token_id) = asset.token_id.clone() else {
            tracing::warn!(
                collection = %collection.name,
                source = %SourceId::MagicEden,
                "Skipping activity record without a token id."
            );
            return None;
        };
        let Some(tx_hash) =
            raw.transaction_info.as_ref().and_then(|info| info.transaction_id.clone())
        else {
            tracing::warn!(
                collection = %collection.name,
                source = %SourceId::MagicEden,
                token_id,
                "Skipping activity record without a transaction hash."
            );
            return None;
        };
        let timestamp = match DateTime::parse_from_rfc3339(&raw.timestamp) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!(
                    collection = %collection.name,
                    source = %SourceId::MagicEden,
                    token_id,
                    error = %e,
                    "Skipping activity record with an unparseable timestamp."
                );
                return None;
            }
        };

        let from_address = raw.from_address.to_lowercase();
        let to_address = raw.to_address.to_lowercase();

        // A trade out of the zero address is a mint wearing a trade costume;
        // the MINT feed reports it properly.
        if kind == ActivityKind::Sale && from_address == collection.zero_address {
            tracing::debug!(
                collection = %collection.name,
                token_id,
                "Dropping zero-address trade (mint signal)."
            );
            return None;
        }

        let (price_native, currency_symbol) = if kind == ActivityKind::Sale {
            let price = raw
                .unit_price
                .as_ref()
                .and_then(|p| p.amount.as_ref())
                .and_then(|a| a.native.as_ref())
                .and_then(json_number);
            let symbol = raw
                .unit_price
                .as_ref()
                .and_then(|p| p.currency.as_ref())
                .and_then(|c| c.symbol.clone());
            (price, symbol)
        } else {
            (None, None)
        };

        Some(Activity {
            kind,
            token_id,
            tx_hash,
            from_address,
            to_address,
            price_native,
            currency_symbol,
            token_name: asset.name.clone(),
            image_url: asset
                .media_v2
                .as_ref()
                .and_then(|m| m.main.as_ref())
                .and_then(|m| m.uri.clone()),
            timestamp,
            source: SourceId::MagicEden,
        })
    }
}

#[async_trait]
impl ActivitySource for MagicEdenSource {
    fn id(&self) -> SourceId {
        SourceId::MagicEden
    }

    fn supports(&self, _kind: ActivityKind) -> bool {
        true
    }

    async fn fetch_activity(
        &self,
        collection: &CollectionConfig,
        kind: ActivityKind,
        limit: u32,
    ) -> Result<Vec<Activity>, SourceError> {
        let url = format!(
            "{}/v4/activity/nft?chain={}&activityTypes[]={}&collectionId={}&limit={}&sortBy=timestamp&sortDir=desc",
            self.base_url,
            collection.chain,
            wire_activity_type(kind),
            collection.contract_address,
            limit,
        );

        let body = self.client.get_json(&url, &[("accept", "*/*")]).await?;

        let records = body
            .get("activities")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let activities = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<RawActivity>(record) {
                Ok(raw) => self.convert(raw, collection, kind),
                Err(e) => {
                    tracing::warn!(
                        collection = %collection.name,
                        source = %SourceId::MagicEden,
                        error = %e,
                        "Skipping undecodable activity record."
                    );
                    None
                }
            })
            .collect();

        Ok(activities)
    }
}
