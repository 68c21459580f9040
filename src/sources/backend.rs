//! Kodiak backend vault listing
//!
//! GET `<backend>/vaults?withBaults=true` →
//! `{ data: [{ provider, id, baults: [{ id }], tokenLp: { symbol, price } }] }`
//!
//! Only Kodiak-provided islands with at least one linked bault are kept,
//! optionally narrowed by the bault / staking-token allow-lists.

use alloy_primitives::Address;
use async_trait::async_trait;
use eyre::Result;
use reqwest::Client;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, warn};

use super::{http_client, lenient_f64, SourceError, VaultListing, VaultSource};

const KODIAK_PROVIDER: &str = "kodiak";

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
pub(crate) struct VaultsResponse {
    pub data: Vec<BackendEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BackendEntry {
    pub provider: Option<String>,
    pub id: Option<String>,
    #[serde(default)]
    pub baults: Vec<BaultRef>,
    #[serde(rename = "tokenLp")]
    pub token_lp: Option<TokenLp>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BaultRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenLp {
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
}

// ============================================
// CLIENT
// ============================================

pub struct KodiakBackend {
    http_client: Client,
    url: String,
    only_vaults: Vec<Address>,
    only_staking_tokens: Vec<Address>,
}

impl KodiakBackend {
    pub fn new(url: String, only_vaults: Vec<Address>, only_staking_tokens: Vec<Address>) -> Result<Self> {
        Ok(Self {
            http_client: http_client()?,
            url,
            only_vaults,
            only_staking_tokens,
        })
    }

    /// Apply provider / linkage / allow-list filtering to a parsed response
    pub(crate) fn listings_from(&self, response: VaultsResponse) -> Vec<VaultListing> {
        let mut listings = Vec::new();

        for entry in response.data {
            if entry.provider.as_deref() != Some(KODIAK_PROVIDER) {
                continue;
            }
            let (Some(id), Some(first)) = (entry.id.as_deref(), entry.baults.first()) else {
                continue;
            };

            let (staking_token, vault) = match (Address::from_str(id), Address::from_str(&first.id)) {
                (Ok(token), Ok(vault)) => (token, vault),
                _ => {
                    warn!("Skipping backend entry with malformed address: island={} bault={}", id, first.id);
                    continue;
                }
            };

            if !self.only_vaults.is_empty() && !self.only_vaults.contains(&vault) {
                continue;
            }
            if !self.only_staking_tokens.is_empty() && !self.only_staking_tokens.contains(&staking_token) {
                continue;
            }

            let (symbol, price) = match entry.token_lp {
                Some(lp) => (lp.symbol, lp.price),
                None => (None, None),
            };

            listings.push(VaultListing {
                vault,
                staking_token,
                symbol: symbol.unwrap_or_else(|| crate::tokens::short_address(&staking_token)),
                staking_token_price: price.filter(|p| p.is_finite() && *p > 0.0),
            });
        }

        listings
    }
}

#[async_trait]
impl VaultSource for KodiakBackend {
    async fn list_vaults(&self) -> Result<Vec<VaultListing>> {
        let response = self.http_client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http { status: status.as_u16(), body }.into());
        }

        let parsed: VaultsResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Schema(format!("vault listing: {}", e)))?;

        let listings = self.listings_from(parsed);
        debug!("Backend listed {} baults", listings.len());

        Ok(listings)
    }
}

// ============================================
// TESTS
// ============================================
