//! The Executor
//!
//! Drives one compound per eligible bault, strictly one bault at a time:
//! - re-check `earned()` on retries (someone else may have compounded)
//! - requote with widened slippage after a failure
//! - simulate, sign + submit through the bounty helper, await the receipt
//! - record the beneficiary's staking-token surplus
//!
//! ⚠️  WARNING: This module spends real gas!

mod retry;

pub use retry::RetryBook;

use alloy_primitives::{Address, B256, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::chain::{ChainClient, ClaimCall, SubmitErrorKind, TxStatus};
use crate::config::{Config, ExecutionMode, SlippageSchedule};
use crate::contracts::encode_claim;
use crate::eligibility::EligibleVault;
use crate::sources::{Quote, QuoteRequest, QuoteSource};

// ============================================
// SETTINGS & OUTCOMES
// ============================================

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub mode: ExecutionMode,
    pub bounty_helper: Address,
    pub beneficiary: Address,
    pub max_retries: u32,
    pub slippage: SlippageSchedule,
    pub retry_interval: Duration,
    pub confirmation_timeout: Duration,
}

impl ExecutorSettings {
    pub fn from_config(config: &Config, beneficiary: Address) -> Self {
        Self {
            mode: config.execution_mode,
            bounty_helper: config.bounty_helper,
            beneficiary,
            max_retries: config.max_retries,
            slippage: config.slippage_schedule(),
            retry_interval: config.retry_interval,
            confirmation_timeout: config.confirmation_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundStatus {
    Success,
    Skipped,
    Failed,
    DryRun,
}

impl std::fmt::Display for CompoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompoundStatus::Success => write!(f, "success"),
            CompoundStatus::Skipped => write!(f, "skipped"),
            CompoundStatus::Failed => write!(f, "failed"),
            CompoundStatus::DryRun => write!(f, "dry-run"),
        }
    }
}

/// Final result for one bault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundOutcome {
    pub vault: Address,
    pub symbol: String,
    pub wrapper: Address,
    pub status: CompoundStatus,
    pub reason: Option<String>,
    pub tx_hash: Option<B256>,

    /// Staking tokens received by the beneficiary
    pub surplus: Option<U256>,

    /// Failed attempts before this outcome
    pub retry_count: u32,
    pub slippage_bps: u32,
}

impl CompoundOutcome {
    fn new(eligible: &EligibleVault, status: CompoundStatus) -> Self {
        Self {
            vault: eligible.vault.address,
            symbol: eligible.vault.symbol.clone(),
            wrapper: eligible.choice.wrapper,
            status,
            reason: None,
            tx_hash: None,
            surplus: None,
            retry_count: 0,
            slippage_bps: 0,
        }
    }

    /// Outcome for a bault that was never attempted
    pub fn skipped(eligible: &EligibleVault, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(eligible, CompoundStatus::Skipped)
        }
    }
}

/// One pass through ATTEMPT
#[derive(Debug)]
enum Attempt {
    Success { tx_hash: B256, surplus: Option<U256> },
    Skipped { reason: String, tx_hash: Option<B256> },
    Failed { reason: String, tx_hash: Option<B256> },
}

// ============================================
// COMPOUND EXECUTOR
// ============================================

pub struct CompoundExecutor {
    chain: Arc<dyn ChainClient>,
    quotes: Arc<dyn QuoteSource>,
    settings: ExecutorSettings,
}

impl CompoundExecutor {
    pub fn new(chain: Arc<dyn ChainClient>, quotes: Arc<dyn QuoteSource>, settings: ExecutorSettings) -> Self {
        Self { chain, quotes, settings }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run the retry state machine for one bault to a terminal outcome
    pub async fn execute(&self, eligible: &EligibleVault, retries: &mut RetryBook) -> CompoundOutcome {
        let vault = eligible.vault.address;
        let mut attempt = retries.attempts(&vault);

        if self.settings.mode == ExecutionMode::DryRun {
            info!(
                "📋 DRY RUN: would compound {} via {:?} (quote {})",
                eligible.vault.symbol, eligible.choice.wrapper, eligible.quote.amount_out
            );
            return CompoundOutcome {
                reason: Some("execution disabled".into()),
                slippage_bps: self.settings.slippage.for_attempt(attempt),
                ..CompoundOutcome::new(eligible, CompoundStatus::DryRun)
            };
        }

        loop {
            let slippage_bps = self.settings.slippage.for_attempt(attempt);
            let finish = |status: CompoundStatus, reason: Option<String>, tx_hash: Option<B256>| CompoundOutcome {
                reason,
                tx_hash,
                retry_count: attempt,
                slippage_bps,
                ..CompoundOutcome::new(eligible, status)
            };

            let quote = if attempt == 0 {
                eligible.quote.clone()
            } else {
                match self.requote(eligible, slippage_bps).await {
                    Ok(q) => q,
                    Err(e) => {
                        return finish(CompoundStatus::Failed, Some(format!("requote failed: {}", e)), None);
                    }
                }
            };

            if quote.amount_out < eligible.vault.bounty {
                retries.clear(&vault);
                return finish(CompoundStatus::Skipped, Some("quote now below bounty".into()), None);
            }

            debug!(
                "Attempt {} for {} (block {} snapshot) at {} bps: quote {}, gas {:?}, impact {:?}, route value {}",
                attempt + 1,
                eligible.vault.symbol,
                eligible.vault.block_number,
                slippage_bps,
                quote.amount_out,
                quote.gas,
                quote.price_impact,
                quote.tx.value
            );

            match self.attempt(eligible, &quote, attempt, retries.baseline(&vault)).await {
                Attempt::Success { tx_hash, surplus } => {
                    retries.clear(&vault);
                    info!("✅ Compounded {} in {:?}", eligible.vault.symbol, tx_hash);
                    return CompoundOutcome {
                        surplus,
                        ..finish(CompoundStatus::Success, None, Some(tx_hash))
                    };
                }
                Attempt::Skipped { reason, tx_hash } => {
                    retries.clear(&vault);
                    warn!("⏭️  Skipped {}: {}", eligible.vault.symbol, reason);
                    return finish(CompoundStatus::Skipped, Some(reason), tx_hash);
                }
                Attempt::Failed { reason, tx_hash } => {
                    if attempt >= self.settings.max_retries {
                        retries.clear(&vault);
                        warn!("❌ Giving up on {} after {} retries: {}", eligible.vault.symbol, attempt, reason);
                        return finish(CompoundStatus::Failed, Some(reason), tx_hash);
                    }

                    attempt = retries.record_failure(vault, eligible.vault.earned);
                    warn!(
                        "🔁 {} failed ({}), retry {}/{} in {:?}",
                        eligible.vault.symbol, reason, attempt, self.settings.max_retries, self.settings.retry_interval
                    );
                    tokio::time::sleep(self.settings.retry_interval).await;
                }
            }
        }
    }

    async fn requote(&self, eligible: &EligibleVault, slippage_bps: u32) -> eyre::Result<Quote> {
        self.quotes
            .quote(&QuoteRequest {
                token_in: eligible.choice.wrapper,
                token_out: eligible.vault.staking_token,
                amount_in: eligible.choice.mint_amount,
                slippage_bps,
            })
            .await
    }

    async fn attempt(
        &self,
        eligible: &EligibleVault,
        quote: &Quote,
        attempt: u32,
        baseline: Option<U256>,
    ) -> Attempt {
        let vault = &eligible.vault;

        if attempt > 0 {
            if let Some(baseline) = baseline {
                match self.chain.earned(vault.address).await {
                    Ok(current) if current < baseline => {
                        return Attempt::Skipped {
                            reason: "already compounded by another actor".into(),
                            tx_hash: None,
                        };
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Could not re-check earned for {}: {}", vault.symbol, e),
                }
            }
        }

        let beneficiary = self.settings.beneficiary;
        let balance_before = self
            .chain
            .token_balance(vault.staking_token, beneficiary)
            .await
            .map_err(|e| warn!("Balance read failed for {}: {}", vault.symbol, e))
            .ok();

        let call = ClaimCall {
            to: self.settings.bounty_helper,
            data: encode_claim(
                vault.address,
                eligible.choice.wrapper,
                quote.tx.to,
                quote.tx.data.clone(),
                eligible.choice.mint_amount,
                beneficiary,
            ),
            value: U256::ZERO,
        };

        if let Err(e) = self.chain.simulate(&call).await {
            return Attempt::Failed {
                reason: format!("compound simulation failed: {}", e),
                tx_hash: None,
            };
        }

        let tx_hash = match self.chain.submit(&call).await {
            Ok(hash) => hash,
            Err(e) => return classify_send_error(&e.to_string(), None),
        };
        info!("📤 Submitted compound for {}: {:?}", vault.symbol, tx_hash);

        match self
            .chain
            .wait_for_receipt(tx_hash, self.settings.confirmation_timeout)
            .await
        {
            Ok(TxStatus::Success) => {
                let balance_after = self
                    .chain
                    .token_balance(vault.staking_token, beneficiary)
                    .await
                    .ok();
                let surplus = match (balance_before, balance_after) {
                    (Some(before), Some(after)) => Some(after.saturating_sub(before)),
                    _ => None,
                };
                Attempt::Success { tx_hash, surplus }
            }
            Ok(TxStatus::Reverted) => Attempt::Failed {
                reason: "transaction reverted".into(),
                tx_hash: Some(tx_hash),
            },
            Err(e) => classify_send_error(&e.to_string(), Some(tx_hash)),
        }
    }
}

fn classify_send_error(message: &str, tx_hash: Option<B256>) -> Attempt {
    match SubmitErrorKind::classify(message) {
        SubmitErrorKind::NonceConflict => Attempt::Skipped {
            reason: format!("nonce conflict: {}", message),
            tx_hash,
        },
        SubmitErrorKind::Other => Attempt::Failed {
            reason: format!("transaction failed: {}", message),
            tx_hash,
        },
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::contracts::IBountyHelper;
    use crate::pricing::tests::FixedQuotes;
    use crate::selector::WrapperChoice;
    use crate::sources::{QuoteTx, VaultListing};
    use crate::tokens::IBGT;
    use crate::vault::Vault;
    use alloy_sol_types::SolCall;

    fn settings(max_retries: u32) -> ExecutorSettings {
        ExecutorSettings {
            mode: ExecutionMode::Execute,
            bounty_helper: Address::repeat_byte(0x4a),
            beneficiary: Address::repeat_byte(0xbe),
            max_retries,
            slippage: SlippageSchedule { base_bps: 20, increment_bps: 15, max_bps: 100 },
            retry_interval: Duration::ZERO,
            confirmation_timeout: Duration::from_secs(1),
        }
    }

    fn eligible() -> EligibleVault {
        let listing = VaultListing {
            vault: Address::repeat_byte(0xaa),
            staking_token: Address::repeat_byte(0x11),
            symbol: "KODI-LP".into(),
            staking_token_price: Some(1.0),
        };
        EligibleVault {
            vault: Vault {
                bounty: U256::from(100u64),
                earned: U256::from(1_000u64),
                ..Vault::from_listing(&listing, 1)
            },
            choice: WrapperChoice { wrapper: IBGT, mint_amount: U256::from(40u64), value: U256::from(120u64) },
            quote: Quote {
                amount_out: U256::from(120u64),
                tx: QuoteTx { to: Address::repeat_byte(0xe5), data: vec![1, 2].into(), value: U256::ZERO },
                gas: None,
                price_impact: None,
            },
        }
    }

    fn executor(chain: Arc<MockChain>, quotes: Arc<FixedQuotes>, max_retries: u32) -> CompoundExecutor {
        CompoundExecutor::new(chain, quotes, settings(max_retries))
    }

    #[tokio::test]
    async fn test_success_records_surplus() {
        let chain = Arc::new(MockChain::new());
        chain.push_balances(&[500, 530]);
        let quotes = FixedQuotes::new(Some(120));
        let mut book = RetryBook::new();

        let outcome = executor(chain.clone(), quotes.clone(), 2).execute(&eligible(), &mut book).await;

        assert_eq!(outcome.status, CompoundStatus::Success);
        assert_eq!(outcome.surplus, Some(U256::from(30u64)));
        assert_eq!(outcome.retry_count, 0);
        assert_eq!(outcome.slippage_bps, 20);
        assert_eq!(quotes.request_count(), 0);

        let submitted = chain.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].to, Address::repeat_byte(0x4a));
        let decoded = IBountyHelper::claimBgtWrapperCall::abi_decode(&submitted[0].data).unwrap();
        assert_eq!(decoded.bault, Address::repeat_byte(0xaa));
        assert_eq!(decoded.swapTarget, Address::repeat_byte(0xe5));
        assert_eq!(decoded.minAmountOut, U256::from(40u64));
        assert_eq!(decoded.beneficiary, Address::repeat_byte(0xbe));
    }

    #[tokio::test]
    async fn test_revert_then_success_reports_one_retry() {
        let chain = Arc::new(MockChain::new());
        chain.set_earned(Address::repeat_byte(0xaa), U256::from(1_000u64));
        chain.push_receipt(Ok(TxStatus::Reverted));
        chain.push_receipt(Ok(TxStatus::Success));
        let quotes = FixedQuotes::new(Some(110));
        let mut book = RetryBook::new();

        let outcome = executor(chain.clone(), quotes.clone(), 3).execute(&eligible(), &mut book).await;

        assert_eq!(outcome.status, CompoundStatus::Success);
        assert_eq!(outcome.retry_count, 1);
        assert_eq!(outcome.slippage_bps, 35);
        assert_eq!(chain.submit_count(), 2);
        assert_eq!(quotes.requests.lock().unwrap()[0].slippage_bps, 35);
        assert!(book.is_empty());
    }

    #[tokio::test]
    async fn test_external_claim_skips_without_submitting() {
        let chain = Arc::new(MockChain::new());
        // Earned dropped from the 1000 snapshot: someone else compounded
        chain.set_earned(Address::repeat_byte(0xaa), U256::from(3u64));
        chain.push_simulation(Err("execution reverted: slippage"));
        let quotes = FixedQuotes::new(Some(120));
        let mut book = RetryBook::new();

        let outcome = executor(chain.clone(), quotes, 3).execute(&eligible(), &mut book).await;

        assert_eq!(outcome.status, CompoundStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some("already compounded by another actor"));
        assert_eq!(chain.submit_count(), 0);
        assert!(book.is_empty());
    }

    #[tokio::test]
    async fn test_nonce_conflict_is_skipped_not_retried() {
        let chain = Arc::new(MockChain::new());
        chain.push_submit(Err("nonce too low"));
        let mut book = RetryBook::new();

        let outcome = executor(chain.clone(), FixedQuotes::new(Some(120)), 3)
            .execute(&eligible(), &mut book)
            .await;

        assert_eq!(outcome.status, CompoundStatus::Skipped);
        assert!(outcome.reason.unwrap().starts_with("nonce conflict"));
        assert_eq!(chain.submit_count(), 1);
        assert!(book.is_empty());
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let chain = Arc::new(MockChain::new());
        chain.set_earned(Address::repeat_byte(0xaa), U256::from(1_000u64));
        for _ in 0..5 {
            chain.push_simulation(Err("execution reverted"));
        }
        let mut book = RetryBook::new();

        let outcome = executor(chain.clone(), FixedQuotes::new(Some(120)), 2)
            .execute(&eligible(), &mut book)
            .await;

        assert_eq!(outcome.status, CompoundStatus::Failed);
        assert_eq!(outcome.retry_count, 2);
        assert!(outcome.reason.unwrap().starts_with("compound simulation failed"));
        assert_eq!(chain.simulated.lock().unwrap().len(), 3);
        assert_eq!(chain.submit_count(), 0);
        assert!(book.is_empty());
    }

    #[tokio::test]
    async fn test_no_retries_by_default() {
        let chain = Arc::new(MockChain::new());
        chain.push_receipt(Ok(TxStatus::Reverted));
        let mut book = RetryBook::new();

        let outcome = executor(chain.clone(), FixedQuotes::new(Some(120)), 0)
            .execute(&eligible(), &mut book)
            .await;

        assert_eq!(outcome.status, CompoundStatus::Failed);
        assert_eq!(outcome.retry_count, 0);
        assert_eq!(outcome.reason.as_deref(), Some("transaction reverted"));
        assert!(outcome.tx_hash.is_some());
    }

    #[tokio::test]
    async fn test_requote_below_bounty_skips() {
        let chain = Arc::new(MockChain::new());
        chain.set_earned(Address::repeat_byte(0xaa), U256::from(1_000u64));
        chain.push_simulation(Err("execution reverted"));
        let mut book = RetryBook::new();

        let outcome = executor(chain.clone(), FixedQuotes::new(Some(90)), 3)
            .execute(&eligible(), &mut book)
            .await;

        assert_eq!(outcome.status, CompoundStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some("quote now below bounty"));
        assert_eq!(outcome.retry_count, 1);
        assert!(book.is_empty());
    }

    #[tokio::test]
    async fn test_failed_requote_keeps_retry_record() {
        let chain = Arc::new(MockChain::new());
        chain.set_earned(Address::repeat_byte(0xaa), U256::from(1_000u64));
        chain.push_simulation(Err("execution reverted"));
        let mut book = RetryBook::new();

        let outcome = executor(chain.clone(), FixedQuotes::new(None), 3)
            .execute(&eligible(), &mut book)
            .await;

        assert_eq!(outcome.status, CompoundStatus::Failed);
        assert!(outcome.reason.unwrap().starts_with("requote failed"));
        let vault = Address::repeat_byte(0xaa);
        assert_eq!(book.attempts(&vault), 1);
        assert_eq!(book.baseline(&vault), Some(U256::from(1_000u64)));
    }

    #[tokio::test]
    async fn test_carried_record_resumes_with_wider_slippage() {
        let chain = Arc::new(MockChain::new());
        chain.set_earned(Address::repeat_byte(0xaa), U256::from(1_200u64));
        let quotes = FixedQuotes::new(Some(115));
        let mut book = RetryBook::new();
        book.record_failure(Address::repeat_byte(0xaa), U256::from(1_000u64));

        let outcome = executor(chain.clone(), quotes.clone(), 3).execute(&eligible(), &mut book).await;

        assert_eq!(outcome.status, CompoundStatus::Success);
        assert_eq!(outcome.retry_count, 1);
        assert_eq!(outcome.slippage_bps, 35);
        assert_eq!(quotes.requests.lock().unwrap()[0].slippage_bps, 35);
        assert_eq!(chain.submit_count(), 1);
        assert!(book.is_empty());
    }

    #[tokio::test]
    async fn test_carried_baseline_detects_external_claim() {
        let chain = Arc::new(MockChain::new());
        chain.set_earned(Address::repeat_byte(0xaa), U256::from(400u64));
        let quotes = FixedQuotes::new(Some(120));
        let mut book = RetryBook::new();
        book.record_failure(Address::repeat_byte(0xaa), U256::from(1_000u64));

        let outcome = executor(chain.clone(), quotes.clone(), 3).execute(&eligible(), &mut book).await;

        assert_eq!(outcome.status, CompoundStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some("already compounded by another actor"));
        assert_eq!(quotes.requests.lock().unwrap()[0].slippage_bps, 35);
        assert!(chain.simulated.lock().unwrap().is_empty());
        assert_eq!(chain.submit_count(), 0);
        assert!(book.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let chain = Arc::new(MockChain::new());
        let mut exec = executor(chain.clone(), FixedQuotes::new(Some(120)), 1);
        exec.settings.mode = ExecutionMode::DryRun;

        let outcome = exec.execute(&eligible(), &mut RetryBook::new()).await;

        assert_eq!(outcome.status, CompoundStatus::DryRun);
        assert!(chain.simulated.lock().unwrap().is_empty());
        assert_eq!(chain.submit_count(), 0);
    }
}
