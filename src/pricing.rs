//! Price Oracle Adapter
//!
//! "What is `amount` of token A worth in token B?"
//!
//! 1. Both USD prices known (and target > 0): amount × pA / pB, less a
//!    safety discount, floored
//! 2. Otherwise: a live swap quote for the exact amount (its amountOut is
//!    used as-is, the quote already embeds slippage)
//! 3. A zero amount is worth zero and never touches either source

use alloy_primitives::{Address, U256};
use eyre::{eyre, Result};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::sources::{PriceIndex, QuoteRequest, QuoteSource, VaultListing};
use crate::tokens::{DEFAULT_WRAPPER_ORDER, WBERA};

pub const BASIS_POINTS: u32 = 10_000;

// ============================================
// NUMERIC HELPERS
// ============================================

pub fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(0.0)
}

/// Floor a non-negative float into an integer amount (0 for NaN/inf/negatives)
pub fn f64_to_u256(value: f64) -> U256 {
    if !value.is_finite() || value <= 0.0 {
        return U256::ZERO;
    }
    U256::from_str(&format!("{:.0}", value.floor())).unwrap_or(U256::ZERO)
}

/// amount × price_token / price_target × (1 − discount), floored
pub fn convert_by_price(amount: U256, price_token: f64, price_target: f64, discount_bps: u32) -> U256 {
    if amount.is_zero() || price_target <= 0.0 || discount_bps >= BASIS_POINTS {
        return U256::ZERO;
    }
    let keep = (BASIS_POINTS - discount_bps) as f64 / BASIS_POINTS as f64;
    f64_to_u256(u256_to_f64(amount) * price_token / price_target * keep)
}

// ============================================
// PRICE BOOK
// ============================================

/// USD prices gathered once per cycle
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    prices: HashMap<Address, f64>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: Address, usd: f64) {
        if usd.is_finite() && usd > 0.0 {
            self.prices.insert(token, usd);
        }
    }

    pub fn get(&self, token: &Address) -> Option<f64> {
        self.prices.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Build the cycle's book: staking-token prices from the listing,
    /// wrapper and native prices from the index.
    ///
    /// Index failures are not fatal. The affected tokens are simply absent,
    /// which routes their valuations through live quotes.
    pub async fn load(index: &dyn PriceIndex, listings: &[VaultListing]) -> Self {
        let mut book = Self::new();

        for listing in listings {
            if let Some(price) = listing.staking_token_price {
                book.insert(listing.staking_token, price);
            }
        }

        let native_usd = match index.native_usd_price().await {
            Ok(p) => p,
            Err(e) => {
                warn!("Price index unavailable, falling back to quotes: {}", e);
                return book;
            }
        };
        book.insert(WBERA, native_usd);

        match index.token_usd_prices(&DEFAULT_WRAPPER_ORDER, native_usd).await {
            Ok(prices) => {
                for (token, price) in prices {
                    book.insert(token, price);
                }
            }
            Err(e) => warn!("Wrapper prices unavailable, falling back to quotes: {}", e),
        }

        debug!("💱 Price book: {} tokens (native ${:.4})", book.len(), native_usd);
        book
    }
}

// ============================================
// ADAPTER
// ============================================

pub struct PriceOracleAdapter {
    book: PriceBook,
    quotes: Arc<dyn QuoteSource>,

    /// Discount applied to index valuations (bps)
    safety_bps: u32,

    /// Slippage requested on fallback quotes (bps)
    quote_slippage_bps: u32,
}

impl PriceOracleAdapter {
    pub fn new(
        book: PriceBook,
        quotes: Arc<dyn QuoteSource>,
        safety_bps: u32,
        quote_slippage_bps: u32,
    ) -> Result<Self> {
        if safety_bps >= BASIS_POINTS {
            return Err(eyre!(
                "Safety slippage must be below {} bps (got {})",
                BASIS_POINTS,
                safety_bps
            ));
        }

        Ok(Self { book, quotes, safety_bps, quote_slippage_bps })
    }

    /// Index-only valuation; `None` when either price is missing or the
    /// target price is not positive
    pub fn index_value(&self, token: Address, amount: U256, target: Address, discount_bps: u32) -> Option<U256> {
        if amount.is_zero() {
            return Some(U256::ZERO);
        }
        let price_token = self.book.get(&token)?;
        let price_target = self.book.get(&target).filter(|p| *p > 0.0)?;
        Some(convert_by_price(amount, price_token, price_target, discount_bps))
    }

    /// Value with the configured safety discount
    pub async fn value_of(&self, token: Address, amount: U256, target: Address) -> Result<U256> {
        self.value_with_discount(token, amount, target, self.safety_bps).await
    }

    pub async fn value_with_discount(
        &self,
        token: Address,
        amount: U256,
        target: Address,
        discount_bps: u32,
    ) -> Result<U256> {
        if let Some(value) = self.index_value(token, amount, target, discount_bps) {
            return Ok(value);
        }

        debug!("No index price for {:?} -> {:?}, requesting quote", token, target);
        let quote = self
            .quotes
            .quote(&QuoteRequest {
                token_in: token,
                token_out: target,
                amount_in: amount,
                slippage_bps: self.quote_slippage_bps,
            })
            .await
            .map_err(|e| eyre!("fallback quote failed: {}", e))?;

        Ok(quote.amount_out)
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sources::{Quote, QuoteTx};
    use crate::tokens::{IBGT, LBGT};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Quote source answering a fixed amountOut and recording requests
    pub(crate) struct FixedQuotes {
        pub amount_out: Mutex<Option<U256>>,
        pub requests: Mutex<Vec<QuoteRequest>>,
    }

    impl FixedQuotes {
        pub(crate) fn new(amount_out: Option<u64>) -> Arc<Self> {
            Arc::new(Self {
                amount_out: Mutex::new(amount_out.map(U256::from)),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl QuoteSource for FixedQuotes {
        async fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
            self.requests.lock().unwrap().push(request.clone());
            let amount_out = self
                .amount_out
                .lock()
                .unwrap()
                .ok_or_else(|| eyre!("HTTP 500: upstream error"))?;
            Ok(Quote {
                amount_out,
                tx: QuoteTx {
                    to: Address::repeat_byte(0xe5),
                    data: vec![0xab, 0xcd].into(),
                    value: U256::ZERO,
                },
                gas: None,
                price_impact: None,
            })
        }
    }

    struct FlakyIndex;

    #[async_trait]
    impl PriceIndex for FlakyIndex {
        async fn native_usd_price(&self) -> Result<f64> {
            Err(eyre!("subgraph down"))
        }

        async fn token_usd_prices(&self, _tokens: &[Address], _native: f64) -> Result<HashMap<Address, f64>> {
            unreachable!()
        }
    }

    const ONE: u128 = 1_000_000_000_000_000_000;

    fn adapter(quotes: Arc<FixedQuotes>, safety_bps: u32) -> PriceOracleAdapter {
        let mut book = PriceBook::new();
        book.insert(IBGT, 2.0);
        book.insert(WBERA, 1.0);
        PriceOracleAdapter::new(book, quotes, safety_bps, 20).unwrap()
    }

    #[test]
    fn test_f64_conversion_floors() {
        assert_eq!(f64_to_u256(12.99), U256::from(12u64));
        assert_eq!(f64_to_u256(-3.0), U256::ZERO);
        assert_eq!(f64_to_u256(f64::INFINITY), U256::ZERO);
        assert_eq!(u256_to_f64(U256::from(ONE)), 1e18);
    }

    #[test]
    fn test_convert_by_price() {
        let value = convert_by_price(U256::from(ONE), 2.0, 1.0, 5_000);
        assert_eq!(value, U256::from(ONE));

        let discounted = u256_to_f64(convert_by_price(U256::from(ONE), 2.0, 1.0, 100));
        assert!((discounted - 1.98e18).abs() < 1e4);
    }

    #[tokio::test]
    async fn test_zero_amount_is_zero_without_sources() {
        let quotes = FixedQuotes::new(Some(5));
        let oracle = adapter(quotes.clone(), 100);

        // Priced pair
        assert_eq!(oracle.value_of(IBGT, U256::ZERO, WBERA).await.unwrap(), U256::ZERO);
        // Unpriced pair
        assert_eq!(oracle.value_of(LBGT, U256::ZERO, WBERA).await.unwrap(), U256::ZERO);
        assert_eq!(quotes.request_count(), 0);
    }

    #[tokio::test]
    async fn test_index_value_applies_safety_discount() {
        let quotes = FixedQuotes::new(None);
        let oracle = adapter(quotes.clone(), 5_000);

        let value = oracle.value_of(IBGT, U256::from(3 * ONE), WBERA).await.unwrap();
        assert_eq!(value, U256::from(3 * ONE));
        assert_eq!(quotes.request_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_price_falls_back_to_quote() {
        let quotes = FixedQuotes::new(Some(777));
        let oracle = adapter(quotes.clone(), 100);

        let value = oracle.value_of(LBGT, U256::from(ONE), WBERA).await.unwrap();
        assert_eq!(value, U256::from(777u64));

        let requests = quotes.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].token_in, LBGT);
        assert_eq!(requests[0].amount_in, U256::from(ONE));
    }

    #[tokio::test]
    async fn test_non_positive_target_price_falls_back() {
        let quotes = FixedQuotes::new(Some(9));
        let mut book = PriceBook::new();
        book.insert(IBGT, 2.0);
        book.prices.insert(WBERA, 0.0);
        let oracle = PriceOracleAdapter::new(book, quotes.clone(), 100, 20).unwrap();

        assert_eq!(oracle.value_of(IBGT, U256::from(ONE), WBERA).await.unwrap(), U256::from(9u64));
    }

    #[tokio::test]
    async fn test_fallback_quote_failure_is_an_error() {
        let oracle = adapter(FixedQuotes::new(None), 100);
        let err = oracle.value_of(LBGT, U256::from(ONE), WBERA).await.unwrap_err();
        assert!(err.to_string().contains("fallback quote failed"));
    }

    #[test]
    fn test_safety_bps_bound_is_a_config_error() {
        assert!(PriceOracleAdapter::new(PriceBook::new(), FixedQuotes::new(None), 10_000, 20).is_err());
        assert!(PriceOracleAdapter::new(PriceBook::new(), FixedQuotes::new(None), 9_999, 20).is_ok());
    }

    #[tokio::test]
    async fn test_book_survives_index_failure() {
        let listings = vec![VaultListing {
            vault: Address::repeat_byte(1),
            staking_token: Address::repeat_byte(2),
            symbol: "LP".into(),
            staking_token_price: Some(4.5),
        }];

        let book = PriceBook::load(&FlakyIndex, &listings).await;
        assert_eq!(book.get(&Address::repeat_byte(2)), Some(4.5));
        assert_eq!(book.get(&WBERA), None);
    }
}
