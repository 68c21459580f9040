//! Kodiak v3 subgraph price index
//!
//! Prices are derived relative to the native asset:
//! - `bundle(id: "1") { ethPriceUSD }` gives the native USD price
//! - `token(id) { derivedETH }` gives each token's price in native units
//!
//! USD price = derivedETH × native USD price. Tokens the subgraph does not
//! know are left out of the result rather than treated as errors.

use alloy_primitives::Address;
use async_trait::async_trait;
use eyre::{eyre, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

use super::{http_client, lenient_f64, PriceIndex, SourceError};

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct GraphResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct BundleData {
    bundle: Option<Bundle>,
}

#[derive(Debug, Deserialize)]
struct Bundle {
    #[serde(rename = "ethPriceUSD", default, deserialize_with = "lenient_f64")]
    eth_price_usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    #[serde(rename = "derivedETH", default, deserialize_with = "lenient_f64")]
    derived_eth: Option<f64>,
}

// ============================================
// CLIENT
// ============================================

pub struct SubgraphPriceIndex {
    http_client: Client,
    url: String,
}

impl SubgraphPriceIndex {
    pub fn new(url: String) -> Result<Self> {
        Ok(Self {
            http_client: http_client()?,
            url,
        })
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, query: String) -> Result<T> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http { status: status.as_u16(), body }.into());
        }

        let parsed: GraphResponse<T> = response
            .json()
            .await
            .map_err(|e| SourceError::Schema(format!("subgraph: {}", e)))?;

        if let Some(first) = parsed.errors.first() {
            return Err(eyre!("Subgraph error: {}", first.message));
        }

        parsed.data.ok_or_else(|| SourceError::MissingField("data").into())
    }
}

/// Alias every token lookup as `token_<i>` so one request covers the set
pub(crate) fn build_token_query(tokens: &[Address]) -> String {
    let body = tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            format!(
                "token_{}: token(id: \"{}\") {{ id derivedETH }}",
                i,
                format!("{:?}", token).to_lowercase()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("query {{\n{}\n}}", body)
}

fn prices_from_entries(
    tokens: &[Address],
    entries: &HashMap<String, Option<TokenEntry>>,
    native_usd: f64,
) -> HashMap<Address, f64> {
    tokens
        .iter()
        .enumerate()
        .filter_map(|(i, token)| {
            let derived = entries
                .get(&format!("token_{}", i))
                .and_then(|e| e.as_ref())
                .and_then(|e| e.derived_eth)?;
            Some((*token, derived * native_usd))
        })
        .collect()
}

#[async_trait]
impl PriceIndex for SubgraphPriceIndex {
    async fn native_usd_price(&self) -> Result<f64> {
        let data: BundleData = self
            .post("{ bundle(id: \"1\") { ethPriceUSD } }".to_string())
            .await?;

        data.bundle
            .and_then(|b| b.eth_price_usd)
            .filter(|p| *p > 0.0)
            .ok_or_else(|| eyre!("Failed to fetch native price from bundle"))
    }

    async fn token_usd_prices(&self, tokens: &[Address], native_usd: f64) -> Result<HashMap<Address, f64>> {
        if tokens.is_empty() {
            return Ok(HashMap::new());
        }

        let entries: HashMap<String, Option<TokenEntry>> = self.post(build_token_query(tokens)).await?;
        let prices = prices_from_entries(tokens, &entries, native_usd);

        debug!("Subgraph priced {}/{} tokens", prices.len(), tokens.len());
        Ok(prices)
    }
}

// ============================================
// TESTS
// ============================================
