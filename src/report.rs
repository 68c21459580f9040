//! Cycle report - what was skipped, what was eligible, what was executed

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use console::style;

use crate::chain::RpcStats;
use crate::config::{CycleLog, ExecutionMode, EXPLORER_TX_URL};
use crate::eligibility::{EligibleVault, IneligibleVault};
use crate::executor::{CompoundOutcome, CompoundStatus};
use crate::pricing::u256_to_f64;
use crate::tokens::symbol_of;
use crate::vault::VaultError;

const WEI_PER_TOKEN: f64 = 1e18;

// ============================================
// FORMATTING
// ============================================

/// Human-readable 18-decimal amount: "0", "1.23M", "4.5K", "12.3456",
/// "0.012", "3.40e-5"
pub fn format_readable_amount(amount: U256) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let value = u256_to_f64(amount) / WEI_PER_TOKEN;

    if value >= 1_000_000.0 {
        format!("{:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.2}K", value / 1_000.0)
    } else if value >= 1.0 {
        trim(&format!("{:.4}", value))
    } else if value >= 0.01 {
        trim(&format!("{:.1e}", value))
    } else {
        format!("{:.2e}", value)
    }
}

/// Re-print through f64 to drop trailing zeros
fn trim(formatted: &str) -> String {
    formatted
        .parse::<f64>()
        .map(|v| v.to_string())
        .unwrap_or_else(|_| formatted.to_string())
}

/// value / bounty as a percentage with two decimals
pub fn bounty_percentage(value: U256, bounty: U256) -> String {
    if bounty.is_zero() {
        return "0%".to_string();
    }
    format!("{:.2}%", u256_to_f64(value) / u256_to_f64(bounty) * 100.0)
}

pub fn explorer_link(tx_hash: &alloy_primitives::B256) -> String {
    format!("{}/{:?}", EXPLORER_TX_URL, tx_hash)
}

/// The stage-2 quote when one rejected the bault, otherwise the estimate
fn shown_value(entry: &IneligibleVault) -> U256 {
    match &entry.vault.error {
        Some(VaultError::QuoteBelowBounty { quoted }) => *quoted,
        _ => entry.choice.map(|c| c.value).unwrap_or_default(),
    }
}

// ============================================
// CYCLE REPORT
// ============================================

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub block_number: u64,
    pub mode: ExecutionMode,
    pub ineligible: Vec<IneligibleVault>,
    pub eligible: Vec<EligibleVault>,
    pub outcomes: Vec<CompoundOutcome>,
    pub rpc: RpcStats,
    pub fetch_ms: u128,
    pub execution_ms: u128,
    pub total_ms: u128,
}

impl CycleReport {
    fn count(&self, status: CompoundStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(CompoundStatus::Success)
    }

    pub fn skipped(&self) -> usize {
        self.count(CompoundStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(CompoundStatus::Failed)
    }

    pub fn to_log(&self) -> CycleLog {
        CycleLog {
            timestamp: self.started_at,
            block_number: self.block_number,
            ineligible: self.ineligible.len(),
            eligible: self.eligible.len(),
            succeeded: self.succeeded(),
            skipped: self.skipped(),
            failed: self.failed(),
            transactions: self
                .outcomes
                .iter()
                .filter_map(|o| o.tx_hash.as_ref().map(explorer_link))
                .collect(),
            total_ms: self.total_ms,
        }
    }

    pub fn print(&self) {
        println!();
        println!(
            "{}",
            style("═══════════════════════════════════════════════════════════════").cyan()
        );
        println!(
            "{}",
            style(format!(
                " 🧾 CYCLE REPORT  block {}  {}  ({})",
                self.block_number,
                self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
                self.mode
            ))
            .cyan()
            .bold()
        );
        println!(
            "{}",
            style("═══════════════════════════════════════════════════════════════").cyan()
        );

        println!();
        println!("{}", style(format!("Ineligible baults ({})", self.ineligible.len())).yellow().bold());
        for entry in &self.ineligible {
            let vault = &entry.vault;
            println!("  • {} {}", style(&vault.symbol).bold(), style(format!("{:?}", vault.address)).dim());
            match &vault.error {
                Some(VaultError::FetchFailed) | None => {
                    println!("    {}", style(entry.reason()).red());
                }
                Some(_) => {
                    let value = shown_value(entry);
                    let wrapper = entry
                        .choice
                        .map(|c| symbol_of(&c.wrapper))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "    reward {} ({}) | bounty {} | {} of bounty | earned {}",
                        format_readable_amount(value),
                        wrapper,
                        format_readable_amount(vault.bounty),
                        bounty_percentage(value, vault.bounty),
                        format_readable_amount(vault.earned)
                    );
                    println!("    {}", style(entry.reason()).red());
                }
            }
        }

        println!();
        println!("{}", style(format!("Eligible baults ({})", self.eligible.len())).green().bold());
        for entry in &self.eligible {
            let path = if entry.choice.is_native() {
                "native WBERA".to_string()
            } else {
                symbol_of(&entry.choice.wrapper)
            };
            let usd = entry
                .vault
                .staking_token_price
                .map(|price| format!(" ≈ ${:.2}", u256_to_f64(entry.quote.amount_out) / WEI_PER_TOKEN * price))
                .unwrap_or_default();
            println!(
                "  • {} via {}: quote {}{} vs bounty {} ({})",
                style(&entry.vault.symbol).bold(),
                path,
                format_readable_amount(entry.quote.amount_out),
                usd,
                format_readable_amount(entry.vault.bounty),
                bounty_percentage(entry.quote.amount_out, entry.vault.bounty)
            );
        }

        if !self.outcomes.is_empty() {
            println!();
            println!("{}", style("Execution").magenta().bold());
            for outcome in &self.outcomes {
                let status = match outcome.status {
                    CompoundStatus::Success => style("✓ success").green(),
                    CompoundStatus::Skipped => style("○ skipped").yellow(),
                    CompoundStatus::Failed => style("✗ failed").red(),
                    CompoundStatus::DryRun => style("📋 dry-run").cyan(),
                };
                println!(
                    "  • {} {} (retries {}, slippage {} bps)",
                    style(&outcome.symbol).bold(),
                    status,
                    outcome.retry_count,
                    outcome.slippage_bps
                );
                if let Some(reason) = &outcome.reason {
                    println!("    {}", reason);
                }
                if let Some(surplus) = outcome.surplus {
                    println!("    surplus: {}", format_readable_amount(surplus));
                }
                if let Some(hash) = &outcome.tx_hash {
                    println!("    {}", style(explorer_link(hash)).dim());
                }
            }
        }

        println!();
        println!("Summary:");
        println!(
            "  • Succeeded: {} | Skipped: {} | Failed: {}",
            self.succeeded(),
            self.skipped(),
            self.failed()
        );
        println!(
            "  • Fetch: {}ms | Transactions: {}ms | Total: {}ms",
            self.fetch_ms, self.execution_ms, self.total_ms
        );
        println!(
            "  • RPC: {} multicall, {} normal",
            self.rpc.multicall, self.rpc.normal
        );
        println!();
    }
}

// ============================================
// TESTS
// ============================================
