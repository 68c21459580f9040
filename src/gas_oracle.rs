//! Fee Oracle - EIP-1559 fee parameters for compound transactions
//!
//! maxFeePerGas = latest base fee × multiplier + priority fee
//!
//! Base fee comes from `eth_feeHistory`; falls back to `eth_gasPrice`,
//! then to a constant if the node answers neither.

use alloy_eips::BlockNumberOrTag;
use alloy_provider::{Provider, ProviderBuilder};
use eyre::{eyre, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

// ============================================
// CONSTANTS
// ============================================

/// Cache duration for fee data (roughly one Berachain block)
const CACHE_DURATION_SECS: u64 = 2;

/// Base fee used if every source fails (1 gwei)
const FALLBACK_BASE_FEE_WEI: u128 = 1_000_000_000;

const WEI_PER_GWEI: f64 = 1e9;

// ============================================
// FEE QUOTE
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSource {
    FeeHistory,
    GasPrice,
    Fallback,
}

impl std::fmt::Display for FeeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeSource::FeeHistory => write!(f, "feeHistory"),
            FeeSource::GasPrice => write!(f, "gasPrice"),
            FeeSource::Fallback => write!(f, "Fallback"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeeQuote {
    pub base_fee_wei: u128,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub fetched_at: Instant,
    pub source: FeeSource,
}

impl FeeQuote {
    pub fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() > Duration::from_secs(CACHE_DURATION_SECS)
    }

    pub fn max_fee_gwei(&self) -> f64 {
        self.max_fee_per_gas as f64 / WEI_PER_GWEI
    }
}

/// (maxFeePerGas, maxPriorityFeePerGas) for a given base fee
pub fn compute_fees(base_fee_wei: u128, multiplier: u64, priority_fee_wei: u128) -> (u128, u128) {
    let max_fee = base_fee_wei
        .saturating_mul(multiplier as u128)
        .saturating_add(priority_fee_wei);
    (max_fee, priority_fee_wei)
}

pub fn gwei_to_wei(gwei: f64) -> u128 {
    if !gwei.is_finite() || gwei <= 0.0 {
        return 0;
    }
    (gwei * WEI_PER_GWEI).round() as u128
}

// ============================================
// GAS ORACLE
// ============================================

pub struct GasOracle {
    rpc_url: String,
    base_fee_multiplier: u64,
    priority_fee_wei: u128,
    cache: Arc<RwLock<Option<FeeQuote>>>,
}

impl GasOracle {
    pub fn new(rpc_url: String, base_fee_multiplier: u64, priority_fee_gwei: f64) -> Self {
        Self {
            rpc_url,
            base_fee_multiplier,
            priority_fee_wei: gwei_to_wei(priority_fee_gwei),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Current fee parameters (with caching)
    pub async fn fees(&self) -> FeeQuote {
        {
            let cache = self.cache.read().await;
            if let Some(ref quote) = *cache {
                if !quote.is_stale() {
                    trace!("Using cached fees: {:.3} gwei", quote.max_fee_gwei());
                    return quote.clone();
                }
            }
        }

        let quote = self.fetch_fees().await;

        {
            let mut cache = self.cache.write().await;
            *cache = Some(quote.clone());
        }

        quote
    }

    async fn fetch_fees(&self) -> FeeQuote {
        let (base_fee, source) = match self.fetch_base_fee().await {
            Ok(base) => (base, FeeSource::FeeHistory),
            Err(e) => {
                warn!("feeHistory failed: {}", e);
                match self.fetch_gas_price().await {
                    Ok(price) => (price, FeeSource::GasPrice),
                    Err(e) => {
                        warn!("gasPrice failed, using fallback base fee: {}", e);
                        (FALLBACK_BASE_FEE_WEI, FeeSource::Fallback)
                    }
                }
            }
        };

        let (max_fee, priority) = compute_fees(base_fee, self.base_fee_multiplier, self.priority_fee_wei);
        debug!(
            "⛽ Fees from {}: base {} wei, maxFee {} wei, priority {} wei",
            source, base_fee, max_fee, priority
        );

        FeeQuote {
            base_fee_wei: base_fee,
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority,
            fetched_at: Instant::now(),
            source,
        }
    }

    async fn fetch_base_fee(&self) -> Result<u128> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);

        let history = provider
            .get_fee_history(1, BlockNumberOrTag::Latest, &[50.0])
            .await?;

        history
            .latest_block_base_fee()
            .ok_or_else(|| eyre!("feeHistory returned no base fee"))
    }

    async fn fetch_gas_price(&self) -> Result<u128> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);
        Ok(provider.get_gas_price().await?)
    }
}

// ============================================
// TESTS
// ============================================
