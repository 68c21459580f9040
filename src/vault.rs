//! Per-cycle bault record and the reasons a bault can be excluded

use alloy_primitives::{Address, U256};

use crate::report::format_readable_amount;
use crate::sources::VaultListing;

/// Which wrappers a bault accepts for claims
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperRestriction {
    Any,
    Only(Address),
}

impl WrapperRestriction {
    /// `onlyAllowedBgtWrapper()` returns the zero address when unrestricted
    pub fn from_onchain(wrapper: Address) -> Self {
        if wrapper == Address::ZERO {
            WrapperRestriction::Any
        } else {
            WrapperRestriction::Only(wrapper)
        }
    }
}

/// Why a bault is excluded from execution this cycle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("fetch failed")]
    FetchFailed,

    #[error("insufficient reward (≤ {})", readable(.min))]
    InsufficientReward { min: U256 },

    #[error("wrapper incompatibility: requires {required:?}, compounder only allows {allowed:?}")]
    WrapperIncompatible { required: Address, allowed: Address },

    #[error("no wrapper selection ({0})")]
    NoSelection(String),

    #[error("below threshold: value {} < 99% of bounty {}", readable(.value), readable(.bounty))]
    BelowThreshold { value: U256, bounty: U256 },

    #[error("zero mint amount")]
    ZeroMint,

    #[error("quote failed: {0}")]
    QuoteFailed(String),

    #[error("no valid quote")]
    NoValidQuote,

    #[error("quote below bounty")]
    QuoteBelowBounty { quoted: U256 },
}

fn readable(amount: &U256) -> String {
    format_readable_amount(*amount)
}

/// One bault as seen at a single block
#[derive(Debug, Clone, PartialEq)]
pub struct Vault {
    pub address: Address,
    pub staking_token: Address,
    pub symbol: String,
    pub staking_token_price: Option<f64>,

    /// Block every on-chain field below was read at
    pub block_number: u64,
    pub bounty: U256,
    pub earned: U256,
    pub restriction: WrapperRestriction,

    pub error: Option<VaultError>,
}

impl Vault {
    pub fn from_listing(listing: &VaultListing, block_number: u64) -> Self {
        Self {
            address: listing.vault,
            staking_token: listing.staking_token,
            symbol: listing.symbol.clone(),
            staking_token_price: listing.staking_token_price,
            block_number,
            bounty: U256::ZERO,
            earned: U256::ZERO,
            restriction: WrapperRestriction::Any,
            error: None,
        }
    }

    pub fn with_error(mut self, error: VaultError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_usable(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================
// TESTS
// ============================================
