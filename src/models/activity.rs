//! The canonical, provider-agnostic record of one on-chain event.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of on-chain event an [`Activity`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// A completed secondary-market trade.
    Sale,
    /// A token minted into existence.
    Mint,
    /// A token sent to the burn address.
    Burn,
}

impl ActivityKind {
    /// Every kind, in the order a poll cycle processes them.
    pub const ALL: [ActivityKind; 3] = [ActivityKind::Sale, ActivityKind::Mint, ActivityKind::Burn];

    /// Stable lowercase name used in persistence keys and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Sale => "sale",
            ActivityKind::Mint => "mint",
            ActivityKind::Burn => "burn",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The upstream provider that reported an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Magic Eden v4 activity API (primary).
    MagicEden,
    /// OpenSea v2 events API (secondary, sales only).
    OpenSea,
}

impl SourceId {
    /// Stable provider name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::MagicEden => "magic_eden",
            SourceId::OpenSea => "opensea",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized on-chain event as reported by a source adapter.
///
/// `(token_id, tx_hash)` uniquely identifies the underlying on-chain event no
/// matter which provider reported it; [`Activity::identity`] renders that
/// pair as the dedup key. Records are created per poll cycle and never
/// mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// What happened on-chain.
    pub kind: ActivityKind,
    /// Token identifier within the collection.
    pub token_id: String,
    /// Transaction hash of the on-chain event.
    pub tx_hash: String,
    /// Sender side of the event (seller for sales, previous owner for burns).
    pub from_address: String,
    /// Receiver side of the event (buyer for sales, owner for mints).
    pub to_address: String,
    /// Price in the chain's native currency. Sales only; `None` when the
    /// reporting provider did not supply one.
    pub price_native: Option<f64>,
    /// Currency symbol accompanying `price_native`, when known.
    pub currency_symbol: Option<String>,
    /// Display name of the token, when the provider supplied one.
    pub token_name: Option<String>,
    /// Token image URL, when the provider supplied one.
    pub image_url: Option<String>,
    /// When the event happened on-chain.
    pub timestamp: DateTime<Utc>,
    /// Which provider reported this record.
    pub source: SourceId,
}

impl Activity {
    /// The persisted dedup key for this event: `"{tokenId}-{txHash}"`.
    pub fn identity(&self) -> String {
        format!("{}-{}", self.token_id, self.tx_hash)
    }
}

/// Whether `identity` matches the persisted `{tokenId}-{txHash}` shape: a
/// numeric token id, then a `0x`-prefixed hash. Used to prune corrupt or
/// legacy entries when loading persisted dedup sets.
pub fn is_valid_identity(identity: &str) -> bool {
    match identity.split_once('-') {
        Some((token_id, tx_hash)) => {
            !token_id.is_empty()
                && token_id.bytes().all(|b| b.is_ascii_digit())
                && tx_hash.starts_with("0x")
        }
        None => false,
    }
}
