//! Enso route quotes
//!
//! GET `<enso>/shortcuts/route` with the bounty helper as sender, receiver
//! and spender, so the returned calldata can be executed by the helper
//! inside `claimBgtWrapper`.

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use reqwest::Client;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

use super::{
    http_client, lenient_amount, lenient_f64, Quote, QuoteRequest, QuoteSource, QuoteTx,
    SourceError,
};

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
pub(crate) struct RouteResponse {
    #[serde(default, deserialize_with = "lenient_amount")]
    gas: Option<String>,
    #[serde(rename = "amountOut", default, deserialize_with = "lenient_amount")]
    amount_out: Option<String>,
    #[serde(rename = "priceImpact", default, deserialize_with = "lenient_f64")]
    price_impact: Option<f64>,
    tx: Option<RouteTx>,
}

#[derive(Debug, Deserialize)]
struct RouteTx {
    to: Option<String>,
    data: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    value: Option<String>,
}

impl RouteResponse {
    pub(crate) fn into_quote(self) -> Result<Quote> {
        let amount_out = self
            .amount_out
            .ok_or(SourceError::MissingField("amountOut"))?;
        let amount_out = U256::from_str(amount_out.trim())
            .map_err(|e| SourceError::Schema(format!("amountOut '{}': {}", amount_out, e)))?;

        let tx = self.tx.ok_or(SourceError::MissingField("tx"))?;
        let to = tx.to.ok_or(SourceError::MissingField("tx.to"))?;
        let to = Address::from_str(&to)
            .map_err(|e| SourceError::Schema(format!("tx.to '{}': {}", to, e)))?;
        let data = tx.data.ok_or(SourceError::MissingField("tx.data"))?;
        let data = Bytes::from_str(&data)
            .map_err(|e| SourceError::Schema(format!("tx.data: {}", e)))?;
        let value = match tx.value {
            Some(v) => U256::from_str(v.trim()).unwrap_or_default(),
            None => U256::ZERO,
        };

        Ok(Quote {
            amount_out,
            tx: QuoteTx { to, data, value },
            gas: self.gas.and_then(|g| g.trim().parse().ok()),
            price_impact: self.price_impact,
        })
    }
}

// ============================================
// CLIENT
// ============================================

pub struct EnsoQuoter {
    http_client: Client,
    url: String,
    api_key: String,
    chain_id: u64,

    /// Address that will execute the route (the bounty helper)
    actor: Address,
}

impl EnsoQuoter {
    pub fn new(url: String, api_key: String, chain_id: u64, actor: Address) -> Result<Self> {
        Ok(Self {
            http_client: http_client()?,
            url,
            api_key,
            chain_id,
            actor,
        })
    }

    pub(crate) fn query_params(&self, request: &QuoteRequest) -> Vec<(&'static str, String)> {
        let actor = format!("{:?}", self.actor);
        vec![
            ("chainId", self.chain_id.to_string()),
            ("fromAddress", actor.clone()),
            ("receiver", actor.clone()),
            ("spender", actor),
            ("tokenIn", format!("{:?}", request.token_in)),
            ("tokenOut", format!("{:?}", request.token_out)),
            ("amountIn", request.amount_in.to_string()),
            ("slippage", request.slippage_bps.to_string()),
            ("routingStrategy", "router".to_string()),
        ]
    }
}

#[async_trait]
impl QuoteSource for EnsoQuoter {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        if request.amount_in.is_zero() {
            return Err(eyre!("Refusing to quote a zero amount"));
        }

        let response = self
            .http_client
            .get(&self.url)
            .bearer_auth(&self.api_key)
            .query(&self.query_params(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http { status: status.as_u16(), body }.into());
        }

        let parsed: RouteResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Schema(format!("route: {}", e)))?;
        let quote = parsed.into_quote()?;

        debug!(
            "Enso quote {} {:?} -> {} {:?} ({} bps)",
            request.amount_in, request.token_in, quote.amount_out, request.token_out, request.slippage_bps
        );

        Ok(quote)
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::IBGT;

    #[test]
    fn test_parse_route() {
        let raw = r#"{
            "gas": "412000",
            "amountOut": "1234500000000000000",
            "priceImpact": 12.5,
            "tx": {
                "to": "0xF75584eF6673aD213a685a1B58Cc0330B8eA22Cf",
                "from": "0x4a19d3107F81aAa55202264f2c246aA75734eDb6",
                "data": "0xdeadbeef",
                "value": "0"
            }
        }"#;
        let quote = serde_json::from_str::<RouteResponse>(raw).unwrap().into_quote().unwrap();

        assert_eq!(quote.amount_out, U256::from(1_234_500_000_000_000_000u128));
        assert_eq!(quote.tx.data, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(quote.tx.value, U256::ZERO);
        assert_eq!(quote.gas, Some(412_000));
        assert_eq!(quote.price_impact, Some(12.5));
    }

    #[test]
    fn test_missing_amount_out() {
        let raw = r#"{"tx": {"to": "0x0000000000000000000000000000000000000001", "data": "0x"}}"#;
        let err = serde_json::from_str::<RouteResponse>(raw).unwrap().into_quote().unwrap_err();
        assert!(err.to_string().contains("amountOut"));
    }

    #[test]
    fn test_query_uses_helper_as_actor() {
        let helper = Address::repeat_byte(0x4a);
        let quoter = EnsoQuoter::new("http://localhost".into(), "key".into(), 80094, helper).unwrap();
        let params = quoter.query_params(&QuoteRequest {
            token_in: IBGT,
            token_out: Address::repeat_byte(0x11),
            amount_in: U256::from(5u64),
            slippage_bps: 35,
        });

        let get = |k: &str| params.iter().find(|(key, _)| *key == k).map(|(_, v)| v.clone());
        assert_eq!(get("chainId").as_deref(), Some("80094"));
        assert_eq!(get("fromAddress"), Some(format!("{:?}", helper)));
        assert_eq!(get("spender"), Some(format!("{:?}", helper)));
        assert_eq!(get("amountIn").as_deref(), Some("5"));
        assert_eq!(get("slippage").as_deref(), Some("35"));
        assert_eq!(get("routingStrategy").as_deref(), Some("router"));
    }
}
