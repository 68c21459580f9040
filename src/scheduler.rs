//! Polling Scheduler - one full cycle at a time, forever
//!
//! fetch → select → classify → execute → report, then sleep. Cycles never
//! overlap; retry records and the consecutive-failure counter survive
//! between cycles.

use alloy_primitives::{Address, U256};
use chrono::Utc;
use eyre::{eyre, Result};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::batcher::{OnchainDataBatcher, PreviewInput};
use crate::chain::ChainClient;
use crate::config::{Config, ExecutionMode};
use crate::eligibility::{Candidate, EligibilityFilter};
use crate::executor::{CompoundExecutor, CompoundOutcome, ExecutorSettings, RetryBook};
use crate::pricing::{PriceBook, PriceOracleAdapter};
use crate::report::{format_readable_amount, CycleReport};
use crate::selector::{WrapperPolicy, WrapperSelector};
use crate::sources::{PriceIndex, QuoteSource, VaultSource};
use crate::vault::{Vault, VaultError};

const INSUFFICIENT_BALANCE: &str = "insufficient native balance";

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub loop_interval: Duration,
    pub min_earned_reward: U256,
    pub min_native_balance: U256,

    /// 0 disables the threshold
    pub max_consecutive_failures: u32,

    /// Discount on index valuations (bps)
    pub safety_bps: u32,

    /// Slippage for stage-2 and fallback quotes (bps)
    pub quote_slippage_bps: u32,
    pub policy: WrapperPolicy,
    pub cycle_log_path: Option<String>,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            loop_interval: config.loop_interval,
            min_earned_reward: config.min_earned_reward,
            min_native_balance: config.min_native_balance,
            max_consecutive_failures: config.max_consecutive_failures,
            safety_bps: config.wrapper_slippage_bps,
            quote_slippage_bps: config.compound_slippage_bps,
            policy: WrapperPolicy::new(config.only_allow_default_wrapper, config.default_wrapper),
            cycle_log_path: config.cycle_log_path.clone(),
        }
    }
}

pub struct PollingScheduler {
    vaults: Arc<dyn VaultSource>,
    prices: Arc<dyn PriceIndex>,
    quotes: Arc<dyn QuoteSource>,
    chain: Arc<dyn ChainClient>,

    batcher: OnchainDataBatcher,
    filter: EligibilityFilter,
    executor: CompoundExecutor,

    settings: SchedulerSettings,
    retries: RetryBook,
    consecutive_failures: u32,
}

impl PollingScheduler {
    pub fn new(
        vaults: Arc<dyn VaultSource>,
        prices: Arc<dyn PriceIndex>,
        quotes: Arc<dyn QuoteSource>,
        chain: Arc<dyn ChainClient>,
        executor_settings: ExecutorSettings,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            batcher: OnchainDataBatcher::new(chain.clone()),
            filter: EligibilityFilter::new(quotes.clone(), settings.quote_slippage_bps),
            executor: CompoundExecutor::new(chain.clone(), quotes.clone(), executor_settings),
            vaults,
            prices,
            quotes,
            chain,
            settings,
            retries: RetryBook::new(),
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Loop until the failure threshold is hit or Ctrl+C arrives during a sleep
    pub async fn run(&mut self, once: bool) -> Result<()> {
        let mut cycle = 0u64;

        loop {
            cycle += 1;
            info!("🔄 Cycle #{} starting", cycle);

            let result = self.run_cycle().await;
            match &result {
                Ok(report) => {
                    report.print();
                    if let Some(path) = &self.settings.cycle_log_path {
                        if let Err(e) = report.to_log().append_to_file(path) {
                            warn!("Could not append cycle log to {}: {}", path, e);
                        }
                    }
                }
                Err(e) => error!("❌ Cycle #{} failed: {}", cycle, e),
            }

            self.record_cycle(&result)?;

            if once {
                return result.map(|_| ());
            }

            debug!("Sleeping {:?} until the next cycle", self.settings.loop_interval);
            tokio::select! {
                _ = tokio::time::sleep(self.settings.loop_interval) => {}
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, stopping...");
                    return Ok(());
                }
            }
        }
    }

    /// Update the consecutive-failure counter; errors once the threshold is reached
    fn record_cycle(&mut self, result: &Result<CycleReport>) -> Result<()> {
        let failed = match result {
            Err(_) => true,
            Ok(report) => cycle_failed(report),
        };

        if !failed {
            self.consecutive_failures = 0;
            return Ok(());
        }

        self.consecutive_failures += 1;
        let limit = self.settings.max_consecutive_failures;
        if limit > 0 && self.consecutive_failures >= limit {
            return Err(eyre!(
                "{} consecutive failed cycles (limit {}), shutting down",
                self.consecutive_failures,
                limit
            ));
        }

        warn!("⚠️  Consecutive failed cycles: {}/{}", self.consecutive_failures, limit);
        Ok(())
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        // ═══ FETCH ═══
        let (block, listings) = tokio::try_join!(self.chain.block_number(), self.vaults.list_vaults())?;
        info!("📡 Block {}: {} baults listed", block, listings.len());

        let (book, vaults) = tokio::join!(
            PriceBook::load(self.prices.as_ref(), &listings),
            self.batcher.fetch_all(&listings, block)
        );
        let vaults = vaults?;
        if book.is_empty() {
            warn!("💱 No index prices this cycle; every valuation needs a live quote");
        }
        let oracle = PriceOracleAdapter::new(
            book,
            self.quotes.clone(),
            self.settings.safety_bps,
            self.settings.quote_slippage_bps,
        )?;

        // ═══ PRE-FILTER ═══
        let mut wrappers: HashMap<Address, Vec<Address>> = HashMap::new();
        let vaults: Vec<Vault> = vaults
            .into_iter()
            .map(|vault| {
                if !vault.is_usable() {
                    return vault;
                }
                if vault.earned <= self.settings.min_earned_reward {
                    return vault.with_error(VaultError::InsufficientReward {
                        min: self.settings.min_earned_reward,
                    });
                }
                match self.settings.policy.candidates(vault.restriction) {
                    Ok(candidates) => {
                        wrappers.insert(vault.address, candidates);
                        vault
                    }
                    Err(reason) => vault.with_error(reason),
                }
            })
            .collect();

        let inputs: Vec<PreviewInput> = vaults
            .iter()
            .filter(|v| v.is_usable())
            .filter_map(|v| {
                wrappers.get(&v.address).map(|w| PreviewInput { vault: v.address, wrappers: w.clone() })
            })
            .collect();
        let previews = self.batcher.fetch_wrapper_previews(&inputs, block).await?;

        // ═══ SELECT ═══
        let selector = WrapperSelector::new(&oracle);
        let selections = join_all(vaults.iter().map(|vault| {
            let candidates = wrappers.get(&vault.address).map(Vec::as_slice).unwrap_or(&[]);
            let preview = previews.get(&vault.address);
            let selector = &selector;
            async move {
                if !vault.is_usable() {
                    return None;
                }
                Some(selector.select_best(vault, candidates, preview).await)
            }
        }))
        .await;

        let candidates: Vec<Candidate> = vaults
            .into_iter()
            .zip(selections)
            .map(|(vault, selection)| match selection {
                Some(Ok(choice)) => Candidate { vault, choice: Some(choice) },
                Some(Err(reason)) => Candidate { vault: vault.with_error(reason), choice: None },
                None => Candidate { vault, choice: None },
            })
            .collect();

        // ═══ CLASSIFY ═══
        let classification = self.filter.classify(candidates).await;
        let fetch_ms = start.elapsed().as_millis();
        info!(
            "🎯 {} eligible, {} ineligible",
            classification.eligible.len(),
            classification.ineligible.len()
        );

        // ═══ EXECUTE ═══
        let execution_start = Instant::now();
        let mode = self.executor.settings().mode;
        let mut outcomes = Vec::with_capacity(classification.eligible.len());
        let mut out_of_gas = false;

        for eligible in &classification.eligible {
            if mode == ExecutionMode::Execute && !out_of_gas && !self.has_gas_budget().await {
                out_of_gas = true;
            }
            if out_of_gas {
                outcomes.push(CompoundOutcome::skipped(eligible, INSUFFICIENT_BALANCE));
                continue;
            }

            outcomes.push(self.executor.execute(eligible, &mut self.retries).await);
        }
        let execution_ms = execution_start.elapsed().as_millis();
        if !self.retries.is_empty() {
            debug!("{} baults carry retry records into the next cycle", self.retries.len());
        }

        let rpc = self.chain.take_rpc_stats();
        info!(
            "[RPC Stats] Multicall: {} | Normal: {} | Total: {}",
            rpc.multicall,
            rpc.normal,
            rpc.total()
        );

        Ok(CycleReport {
            started_at,
            block_number: block,
            mode,
            ineligible: classification.ineligible,
            eligible: classification.eligible,
            outcomes,
            rpc,
            fetch_ms,
            execution_ms,
            total_ms: start.elapsed().as_millis(),
        })
    }

    async fn has_gas_budget(&self) -> bool {
        let min = self.settings.min_native_balance;
        match self.chain.native_balance(self.chain.sender()).await {
            Ok(balance) if balance >= min => true,
            Ok(balance) => {
                warn!(
                    "⛽ Native balance {} below minimum {}, skipping remaining baults",
                    format_readable_amount(balance),
                    format_readable_amount(min)
                );
                false
            }
            Err(e) => {
                warn!("⛽ Native balance check failed, skipping remaining baults: {}", e);
                false
            }
        }
    }
}

/// Executed something, nothing succeeded, something failed
fn cycle_failed(report: &CycleReport) -> bool {
    report.succeeded() == 0 && report.failed() > 0
}

// ============================================
// TESTS
// ============================================
