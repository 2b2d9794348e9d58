//! Discord webhook delivery with per-kind embeds.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;

use super::{Notifier, NotifierError};
use crate::models::{Activity, ActivityKind, BurnMessage, CollectionConfig};

const SALE_COLOR: u32 = 0x3498db;
const MINT_COLOR: u32 = 0x2ecc71;
const BURN_COLOR: u32 = 0xe74c3c;

const DEFAULT_BURN_MESSAGE: &str = "{tokenName} has been burned!";

/// Posts per-kind embeds to each collection's configured webhook URLs.
///
/// A collection without a webhook for some kind still has those events
/// deduplicated and recorded upstream; delivery is simply skipped.
pub struct DiscordWebhookNotifier {
    client: Arc<ClientWithMiddleware>,
}

impl DiscordWebhookNotifier {
    /// Creates a notifier posting through the given pooled client.
    pub fn new(client: Arc<ClientWithMiddleware>) -> Self {
        Self { client }
    }

    fn build_payload(
        &self,
        collection: &CollectionConfig,
        activity: &Activity,
    ) -> serde_json::Value {
        let token_name = token_display_name(collection, activity);
        let transaction_link =
            format!("{}{}", collection.transaction_link_base, activity.tx_hash);
        let transaction_field = serde_json::json!({
            "name": "Transaction",
            "value": format!("[View on Explorer]({transaction_link})"),
            "inline": false,
        });

        let mut embed = match activity.kind {
            ActivityKind::Sale => {
                let mut fields = Vec::new();
                if let Some(price) = activity.price_native {
                    let symbol = activity.currency_symbol.as_deref().unwrap_or("ETH");
                    fields.push(serde_json::json!({
                        "name": "Price",
                        "value": format!("{price:.5} {symbol}"),
                        "inline": false,
                    }));
                }
                fields.push(serde_json::json!({
                    "name": "Seller",
                    "value": display_address(&activity.from_address),
                    "inline": true,
                }));
                fields.push(serde_json::json!({
                    "name": "Buyer",
                    "value": display_address(&activity.to_address),
                    "inline": true,
                }));
                fields.push(transaction_field);
                serde_json::json!({
                    "title": format!("{token_name} has been sold!!!"),
                    "color": SALE_COLOR,
                    "fields": fields,
                })
            }
            ActivityKind::Mint => serde_json::json!({
                "title": format!("{token_name} just minted!"),
                "color": MINT_COLOR,
                "fields": [
                    {
                        "name": "Owner",
                        "value": display_address(&activity.to_address),
                        "inline": true,
                    },
                    transaction_field,
                ],
            }),
            ActivityKind::Burn => serde_json::json!({
                "title": weighted_burn_message(&collection.burn_messages, &token_name),
                "color": BURN_COLOR,
                "fields": [
                    {
                        "name": "Previous Owner",
                        "value": display_address(&activity.from_address),
                        "inline": true,
                    },
                    transaction_field,
                ],
            }),
        };

        if let Some(image_url) = &activity.image_url {
            embed["image"] = serde_json::json!({ "url": image_url });
        }

        serde_json::json!({ "embeds": [embed] })
    }
}

#[async_trait]
impl Notifier for DiscordWebhookNotifier {
    async fn notify(
        &self,
        collection: &CollectionConfig,
        activity: &Activity,
    ) -> Result<(), NotifierError> {
        let Some(url) = collection.webhook_for(activity.kind) else {
            tracing::debug!(
                collection = %collection.name,
                kind = %activity.kind,
                "No webhook configured for this kind; skipping delivery."
            );
            return Ok(());
        };

        let payload = self.build_payload(collection, activity);

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifierError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifierError::Delivery(format!("webhook returned {status}")));
        }

        Ok(())
    }
}

fn token_display_name(collection: &CollectionConfig, activity: &Activity) -> String {
    match activity.token_name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{} #{}", collection.name, activity.token_id),
    }
}

/// Shortens an address to `0x123456...abcdef` for display. ENS resolution is
/// a collaborator concern and happens outside this crate.
fn display_address(address: &str) -> String {
    if address.is_empty() {
        return "Unknown".to_string();
    }
    let address = address.to_lowercase();
    match (address.get(..8), address.get(address.len().saturating_sub(6)..)) {
        (Some(head), Some(tail)) if address.len() > 14 => format!("{head}...{tail}"),
        _ => address,
    }
}

/// Picks a burn message by cumulative weight and substitutes the token name.
/// Falls back to the table's last entry when the roll exceeds every
/// cumulative weight, matching how under-weighted tables are expected to
/// behave.
fn weighted_burn_message(messages: &[BurnMessage], token_name: &str) -> String {
    let template = match messages.last() {
        None => DEFAULT_BURN_MESSAGE,
        Some(last) => {
            let roll: f64 = rand::random();
            let mut cumulative = 0.0;
            let mut chosen = &last.message;
            for item in messages {
                cumulative += item.weight;
                if roll < cumulative {
                    chosen = &item.message;
                    break;
                }
            }
            chosen
        }
    };
    template.replace("{tokenName}", token_name)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::HttpRetryConfig,
        http_client::create_retryable_http_client,
        models::SourceId,
        test_helpers::{ActivityBuilder, CollectionBuilder},
    };

    fn notifier() -> DiscordWebhookNotifier {
        let config = HttpRetryConfig { max_retries: 0, ..Default::default() };
        let client = create_retryable_http_client(&config, reqwest::Client::new());
        DiscordWebhookNotifier::new(Arc::new(client))
    }

    #[test]
    fn sale_embed_carries_price_and_parties() {
        let collection = CollectionBuilder::new("Test").build();
        let sale = ActivityBuilder::sale()
            .token_id("42")
            .tx_hash("0xaaa")
            .price(1.5)
            .currency_symbol("ETH")
            .token_name("Cool Cat #42")
            .source(SourceId::MagicEden)
            .build();

        let payload = notifier().build_payload(&collection, &sale);
        let embed = &payload["embeds"][0];

        assert_eq!(embed["title"], "Cool Cat #42 has been sold!!!");
        assert_eq!(embed["color"], SALE_COLOR);
        let rendered = embed["fields"].to_string();
        assert!(rendered.contains("1.50000 ETH"));
        assert!(rendered.contains("Seller"));
        assert!(rendered.contains("Buyer"));
        assert!(rendered.contains("0xaaa"));
    }

    #[test]
    fn sale_embed_without_price_omits_the_price_field() {
        let collection = CollectionBuilder::new("Test").build();
        let sale = ActivityBuilder::sale().token_id("42").tx_hash("0xaaa").build();

        let payload = notifier().build_payload(&collection, &sale);
        assert!(!payload["embeds"][0]["fields"].to_string().contains("Price"));
    }

    #[test]
    fn mint_embed_falls_back_to_collection_name() {
        let collection = CollectionBuilder::new("Cats").build();
        let mint = ActivityBuilder::new(ActivityKind::Mint).token_id("9").build();

        let payload = notifier().build_payload(&collection, &mint);
        let embed = &payload["embeds"][0];

        assert_eq!(embed["title"], "Cats #9 just minted!");
        assert_eq!(embed["color"], MINT_COLOR);
        assert!(embed["fields"].to_string().contains("Owner"));
    }

    #[test]
    fn burn_embed_uses_the_weighted_message_table() {
        let collection = CollectionBuilder::new("Cats")
            .burn_message(1.0, "{tokenName} went up in flames!")
            .build();
        let burn = ActivityBuilder::new(ActivityKind::Burn)
            .token_id("7")
            .token_name("Cat #7")
            .build();

        let payload = notifier().build_payload(&collection, &burn);
        assert_eq!(payload["embeds"][0]["title"], "Cat #7 went up in flames!");
        assert_eq!(payload["embeds"][0]["color"], BURN_COLOR);
    }

    #[test]
    fn empty_burn_table_uses_the_default_message() {
        assert_eq!(weighted_burn_message(&[], "Cat #7"), "Cat #7 has been burned!");
    }

    #[test]
    fn image_is_attached_when_present() {
        let collection = CollectionBuilder::new("Test").build();
        let sale = ActivityBuilder::sale()
            .image_url("https://img.example/1.png")
            .build();

        let payload = notifier().build_payload(&collection, &sale);
        assert_eq!(payload["embeds"][0]["image"]["url"], "https://img.example/1.png");
    }

    #[test]
    fn addresses_are_shortened_for_display() {
        assert_eq!(
            display_address("0xAAAA000000000000000000000000000000000001"),
            "0xaaaa00...000001"
        );
        assert_eq!(display_address("0xshort"), "0xshort");
        assert_eq!(display_address(""), "Unknown");
    }

    #[tokio::test]
    async fn missing_webhook_skips_delivery() {
        let collection = CollectionBuilder::new("Test").build();
        let sale = ActivityBuilder::sale().build();

        // No webhook configured for sales, so no HTTP call is attempted and
        // delivery reports success.
        notifier().notify(&collection, &sale).await.unwrap();
    }

    #[tokio::test]
    async fn webhook_delivery_posts_the_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .with_status(204)
            .create_async()
            .await;

        let collection = CollectionBuilder::new("Test")
            .sales_webhook_url(&format!("{}/hook", server.url()))
            .build();
        let sale = ActivityBuilder::sale().price(1.5).build();

        notifier().notify(&collection, &sale).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_webhook_surfaces_a_delivery_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("POST", "/hook").with_status(400).create_async().await;

        let collection = CollectionBuilder::new("Test")
            .sales_webhook_url(&format!("{}/hook", server.url()))
            .build();
        let sale = ActivityBuilder::sale().build();

        let err = notifier().notify(&collection, &sale).await.unwrap_err();
        assert!(matches!(err, NotifierError::Delivery(_)));
    }
}
