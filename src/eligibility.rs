//! Eligibility Filter - two-stage profitability gate
//!
//! Stage 1 (index estimate): value ≥ 99% of bounty and mint amount > 0.
//! Stage 2 (live quote): amountOut ≥ bounty, quotes fetched concurrently
//! only for stage-1 survivors.

use alloy_primitives::U256;
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

use crate::selector::WrapperChoice;
use crate::sources::{Quote, QuoteRequest, QuoteSource};
use crate::vault::{Vault, VaultError};

/// Stage-1 tolerance: estimates within 1% of the bounty go on to a quote
const STAGE_ONE_PERCENT: u64 = 99;

/// A bault after selection, before the profitability gate
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub vault: Vault,
    pub choice: Option<WrapperChoice>,
}

/// Ready for execution: the live quote is attached
#[derive(Debug, Clone, PartialEq)]
pub struct EligibleVault {
    pub vault: Vault,
    pub choice: WrapperChoice,
    pub quote: Quote,
}

/// Excluded this cycle; `vault.error` carries the reason
#[derive(Debug, Clone, PartialEq)]
pub struct IneligibleVault {
    pub vault: Vault,
    pub choice: Option<WrapperChoice>,
}

impl IneligibleVault {
    pub fn reason(&self) -> String {
        self.vault
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub eligible: Vec<EligibleVault>,
    pub ineligible: Vec<IneligibleVault>,
}

/// Cheap check against the index-based estimate
pub fn screen(choice: &WrapperChoice, bounty: U256) -> Result<(), VaultError> {
    let threshold = bounty * U256::from(STAGE_ONE_PERCENT) / U256::from(100u64);
    if choice.value < threshold {
        return Err(VaultError::BelowThreshold { value: choice.value, bounty });
    }
    if choice.mint_amount.is_zero() {
        return Err(VaultError::ZeroMint);
    }
    Ok(())
}

pub struct EligibilityFilter {
    quotes: Arc<dyn QuoteSource>,
    slippage_bps: u32,
}

impl EligibilityFilter {
    pub fn new(quotes: Arc<dyn QuoteSource>, slippage_bps: u32) -> Self {
        Self { quotes, slippage_bps }
    }

    /// Exact check: a live quote for the chosen path must cover the bounty
    pub async fn confirm(&self, vault: &Vault, choice: &WrapperChoice) -> Result<Quote, VaultError> {
        let quote = self
            .quotes
            .quote(&QuoteRequest {
                token_in: choice.wrapper,
                token_out: vault.staking_token,
                amount_in: choice.mint_amount,
                slippage_bps: self.slippage_bps,
            })
            .await
            .map_err(|e| VaultError::QuoteFailed(e.to_string()))?;

        if quote.amount_out.is_zero() {
            return Err(VaultError::NoValidQuote);
        }
        if quote.amount_out < vault.bounty {
            return Err(VaultError::QuoteBelowBounty { quoted: quote.amount_out });
        }
        Ok(quote)
    }

    pub async fn classify(&self, candidates: Vec<Candidate>) -> Classification {
        let mut classification = Classification::default();
        let mut survivors = Vec::new();

        for Candidate { vault, choice } in candidates {
            if vault.error.is_some() {
                classification.ineligible.push(IneligibleVault { vault, choice });
                continue;
            }

            let Some(selected) = choice else {
                let vault = vault.with_error(VaultError::NoSelection("no wrapper chosen".into()));
                classification.ineligible.push(IneligibleVault { vault, choice });
                continue;
            };

            match screen(&selected, vault.bounty) {
                Ok(()) => survivors.push((vault, selected)),
                Err(reason) => classification.ineligible.push(IneligibleVault {
                    vault: vault.with_error(reason),
                    choice: Some(selected),
                }),
            }
        }

        debug!(
            "Stage 1: {} of {} baults need a live quote",
            survivors.len(),
            survivors.len() + classification.ineligible.len()
        );

        let confirmations = join_all(
            survivors
                .iter()
                .map(|(vault, choice)| self.confirm(vault, choice)),
        )
        .await;

        for ((vault, mut choice), confirmation) in survivors.into_iter().zip(confirmations) {
            match confirmation {
                Ok(quote) => {
                    choice.value = quote.amount_out;
                    classification.eligible.push(EligibleVault { vault, choice, quote });
                }
                Err(reason) => classification.ineligible.push(IneligibleVault {
                    vault: vault.with_error(reason),
                    choice: Some(choice),
                }),
            }
        }

        classification
    }
}

// ============================================
// TESTS
// ============================================
