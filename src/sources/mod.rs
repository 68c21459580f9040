//! External data sources
//!
//! Three HTTP collaborators, each behind a narrow trait so the pipeline can
//! run against in-memory fakes:
//! - `VaultSource`: the Kodiak backend vault listing
//! - `PriceIndex`: the Kodiak v3 subgraph (USD prices via the native asset)
//! - `QuoteSource`: the Enso route aggregator (live swap quotes)
//!
//! Responses are parsed into explicit schemas; anything malformed fails with
//! a typed `SourceError` at the boundary.

mod backend;
mod enso;
mod subgraph;

pub use backend::KodiakBackend;
pub use enso::EnsoQuoter;
pub use subgraph::SubgraphPriceIndex;

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::time::Duration;

/// Timeout for every HTTP call
pub const HTTP_TIMEOUT_SECS: u64 = 15;

// ============================================
// ERRORS
// ============================================

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    Schema(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),
}

// ============================================
// SHARED TYPES
// ============================================

/// One bault from the backend listing
#[derive(Debug, Clone, PartialEq)]
pub struct VaultListing {
    pub vault: Address,
    pub staking_token: Address,
    pub symbol: String,

    /// USD price of the staking token (LP), if the backend knows it
    pub staking_token_price: Option<f64>,
}

/// Parameters of a swap-quote request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub slippage_bps: u32,
}

/// Transaction payload returned with a quote
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuoteTx {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// A live swap quote. Only valid briefly.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub amount_out: U256,
    pub tx: QuoteTx,
    pub gas: Option<u64>,
    pub price_impact: Option<f64>,
}

// ============================================
// TRAITS
// ============================================

#[async_trait]
pub trait VaultSource: Send + Sync {
    async fn list_vaults(&self) -> Result<Vec<VaultListing>>;
}

#[async_trait]
pub trait PriceIndex: Send + Sync {
    /// USD price of the native asset
    async fn native_usd_price(&self) -> Result<f64>;

    /// USD prices for `tokens`; tokens without an entry are simply absent
    async fn token_usd_prices(
        &self,
        tokens: &[Address],
        native_usd: f64,
    ) -> Result<HashMap<Address, f64>>;
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote>;
}

// ============================================
// HELPERS
// ============================================

pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}

/// Accept a number either as a JSON string or a JSON number
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Str(s)) => s.trim().parse().ok(),
        None => None,
    })
}

/// Accept an integer amount either as a JSON string or a JSON number
pub(crate) fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Str(s)) => Some(s),
        Some(Raw::Num(n)) => Some(n.to_string()),
        None => None,
    })
}

// ============================================
// TESTS
// ============================================
