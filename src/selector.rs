//! Wrapper Selector
//!
//! For each bault, pick the claim path that yields the most staking token:
//! one of the allowed BGT wrappers, or the native reward itself (WBERA).
//!
//! Selection rules:
//! - running max starts at 0, compared with strict `>` (first max wins)
//! - when nothing beats 0 the default slot (index 2, iBGT in the standard
//!   order) is reported
//! - WBERA replaces the wrapper only if its value is strictly greater
//! - missing or partially failed preview data yields no selection

use alloy_primitives::{Address, U256};
use futures::future::join_all;

use crate::batcher::PreviewBatch;
use crate::pricing::PriceOracleAdapter;
use crate::tokens::{DEFAULT_WRAPPER_ORDER, WBERA};
use crate::vault::{Vault, VaultError, WrapperRestriction};

/// Slot reported when every candidate is worth zero
pub const DEFAULT_BEST_INDEX: usize = 2;

// ============================================
// WRAPPER POLICY
// ============================================

/// Which wrappers the compounder is willing to claim through
#[derive(Debug, Clone)]
pub struct WrapperPolicy {
    only_default: bool,
    default_wrapper: Address,
    order: Vec<Address>,
}

impl WrapperPolicy {
    pub fn new(only_default: bool, default_wrapper: Address) -> Self {
        Self {
            only_default,
            default_wrapper,
            order: DEFAULT_WRAPPER_ORDER.to_vec(),
        }
    }

    /// Candidate wrappers for a bault's on-chain restriction
    pub fn candidates(&self, restriction: WrapperRestriction) -> Result<Vec<Address>, VaultError> {
        match restriction {
            WrapperRestriction::Any if self.only_default => Ok(vec![self.default_wrapper]),
            WrapperRestriction::Any => Ok(self.order.clone()),
            WrapperRestriction::Only(required) => {
                if self.only_default && required != self.default_wrapper {
                    Err(VaultError::WrapperIncompatible {
                        required,
                        allowed: self.default_wrapper,
                    })
                } else {
                    Ok(vec![required])
                }
            }
        }
    }
}

/// Index of the best value; ties keep the earliest, all-zero keeps the default slot
pub fn pick_best_index(values: &[U256]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }

    let mut best = if values.len() > DEFAULT_BEST_INDEX { DEFAULT_BEST_INDEX } else { 0 };
    let mut max = U256::ZERO;
    for (i, value) in values.iter().enumerate() {
        if *value > max {
            max = *value;
            best = i;
        }
    }

    Some(best)
}

// ============================================
// SELECTOR
// ============================================

/// Result of wrapper selection for one bault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperChoice {
    pub wrapper: Address,
    pub mint_amount: U256,

    /// Estimated value in the bault's staking token
    pub value: U256,
}

impl WrapperChoice {
    pub fn is_native(&self) -> bool {
        self.wrapper == WBERA
    }
}

pub struct WrapperSelector<'a> {
    oracle: &'a PriceOracleAdapter,
}

impl<'a> WrapperSelector<'a> {
    pub fn new(oracle: &'a PriceOracleAdapter) -> Self {
        Self { oracle }
    }

    pub async fn select_best(
        &self,
        vault: &Vault,
        candidates: &[Address],
        preview: Option<&PreviewBatch>,
    ) -> Result<WrapperChoice, VaultError> {
        let preview = preview.ok_or_else(|| VaultError::NoSelection("preview data missing".into()))?;
        if preview.has_any_failure {
            return Err(VaultError::NoSelection("wrapper preview failed".into()));
        }
        if candidates.is_empty() || preview.mint_amounts.len() != candidates.len() {
            return Err(VaultError::NoSelection("no candidate wrappers".into()));
        }
        if !vault.earned.is_zero() && preview.earned.is_zero() {
            return Err(VaultError::NoSelection("earned mismatch: preview reports zero".into()));
        }

        let valuations = join_all(
            candidates
                .iter()
                .zip(&preview.mint_amounts)
                .map(|(wrapper, amount)| self.oracle.value_of(*wrapper, *amount, vault.staking_token)),
        )
        .await;

        let mut values = Vec::with_capacity(valuations.len());
        for valuation in valuations {
            values.push(valuation.map_err(|e| VaultError::NoSelection(e.to_string()))?);
        }

        let best = pick_best_index(&values).ok_or_else(|| VaultError::NoSelection("no candidate wrappers".into()))?;
        let choice = WrapperChoice {
            wrapper: candidates[best],
            mint_amount: preview.mint_amounts[best],
            value: values[best],
        };

        // Native reward needs no swap, so it is valued without the safety discount
        let native = self
            .oracle
            .index_value(WBERA, preview.earned, vault.staking_token, 0);

        match native {
            Some(native_value) if native_value > choice.value => Ok(WrapperChoice {
                wrapper: WBERA,
                mint_amount: preview.earned,
                value: native_value,
            }),
            _ => Ok(choice),
        }
    }
}

// ============================================
// TESTS
// ============================================
