//! Token registry for the bault compounder (Berachain mainnet)
//!
//! Tracks:
//! - BGT wrappers a bault can mint its reward into (yBGT, lBGT, iBGT, mBGT)
//! - The native fallback (WBERA), used when plain BERA beats every wrapper

use alloy_primitives::{address, Address};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::str::FromStr;

/// Represents a token we're tracking
#[derive(Debug, Clone)]
pub struct Token {
    pub symbol: &'static str,
    pub address: Address,
    pub category: TokenCategory,
}

/// Token categories for selection and display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    /// Liquid BGT wrapper minted by `claimBgtWrapper`
    BgtWrapper,

    /// Wrapped native asset (reward held as BERA)
    Native,
}

// ============================================
// ADDRESSES
// ============================================

pub const YBGT: Address = address!("7e768f47dfDD5DAe874Aac233f1Bc5817137E453");
pub const LBGT: Address = address!("BaadCC2962417C01Af99fb2B7C75706B9bd6Babe");
pub const IBGT: Address = address!("ac03CABA51e17c86c921E1f6CBFBdC91F8BB2E6b");
pub const MBGT: Address = address!("927439eEf2e2520aFa78D8742cAe7Be3e3e90B11");
pub const WBERA: Address = address!("6969696969696969696969696969696969696969");

/// Candidate order for unrestricted baults. The selector's zero-value
/// default points into this list (index 2 = iBGT).
pub const DEFAULT_WRAPPER_ORDER: [Address; 4] = [YBGT, LBGT, IBGT, MBGT];

/// Wrapper used when the compounder runs in default-wrapper-only mode
pub const DEFAULT_WRAPPER: Address = IBGT;

lazy_static! {
    static ref REGISTRY: HashMap<Address, Token> = all_tokens()
        .into_iter()
        .map(|t| (t.address, t))
        .collect();
}

pub fn all_tokens() -> Vec<Token> {
    vec![
        Token { symbol: "yBGT", address: YBGT, category: TokenCategory::BgtWrapper },
        Token { symbol: "lBGT", address: LBGT, category: TokenCategory::BgtWrapper },
        Token { symbol: "iBGT", address: IBGT, category: TokenCategory::BgtWrapper },
        Token { symbol: "mBGT", address: MBGT, category: TokenCategory::BgtWrapper },
        Token { symbol: "WBERA", address: WBERA, category: TokenCategory::Native },
    ]
}

/// Lookup a known token
pub fn get_token(address: &Address) -> Option<&'static Token> {
    REGISTRY.get(address)
}

pub fn is_wrapper(address: &Address) -> bool {
    get_token(address)
        .map(|t| t.category == TokenCategory::BgtWrapper)
        .unwrap_or(false)
}

/// Display label: registry symbol, or a shortened address
pub fn symbol_of(address: &Address) -> String {
    match get_token(address) {
        Some(token) => token.symbol.to_string(),
        None => short_address(address),
    }
}

pub fn short_address(address: &Address) -> String {
    format!("0x{}...", &format!("{:?}", address)[2..8])
}

/// Parse a wrapper given either by symbol (case-insensitive) or by address
pub fn parse_wrapper(value: &str) -> Option<Address> {
    let value = value.trim();
    if let Ok(address) = Address::from_str(value) {
        return Some(address);
    }
    all_tokens()
        .into_iter()
        .filter(|t| t.category == TokenCategory::BgtWrapper)
        .find(|t| t.symbol.eq_ignore_ascii_case(value))
        .map(|t| t.address)
}

// ============================================
// TESTS
// ============================================
