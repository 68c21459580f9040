//! Runtime configuration for the bault compounder
//!
//! Everything comes from environment variables (with `.env` support).
//! Credentials are required at startup; every other knob has a default.

use alloy_primitives::{utils::parse_ether, Address, U256};
use chrono::{DateTime, Utc};
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::contracts::DEFAULT_BOUNTY_HELPER;
use crate::pricing::BASIS_POINTS;
use crate::tokens::{self, DEFAULT_WRAPPER};

// ============================================
// DEFAULT ENDPOINTS
// ============================================

pub const DEFAULT_RPC_URL: &str = "https://rpc.berachain.com";
pub const DEFAULT_BACKEND_URL: &str = "https://backend.kodiak.finance/vaults?withBaults=true";
pub const DEFAULT_SUBGRAPH_URL: &str = "https://api.goldsky.com/api/public/project_clpx84oel0al201r78jsl0r3i/subgraphs/kodiak-v3-berachain-mainnet/latest/gn";
pub const DEFAULT_ENSO_API_URL: &str = "https://api.enso.finance/api/v1/shortcuts/route";
pub const EXPLORER_TX_URL: &str = "https://berascan.com/tx";

/// Berachain mainnet
pub const BERACHAIN_CHAIN_ID: u64 = 80094;

// ============================================
// EXECUTION MODE
// ============================================

/// Whether eligible baults are actually compounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Simulate, submit and await every eligible compound
    Execute,

    /// Run the full pipeline (including live quotes) but never touch the chain
    DryRun,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Execute
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Execute => write!(f, "EXECUTE"),
            ExecutionMode::DryRun => write!(f, "DRY_RUN"),
        }
    }
}

// ============================================
// SLIPPAGE SCHEDULE
// ============================================

/// Quote slippage widened on every retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlippageSchedule {
    pub base_bps: u32,
    pub increment_bps: u32,
    pub max_bps: u32,
}

impl SlippageSchedule {
    /// base + increment * attempt, capped at max
    pub fn for_attempt(&self, attempt: u32) -> u32 {
        self.base_bps
            .saturating_add(self.increment_bps.saturating_mul(attempt))
            .min(self.max_bps)
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone)]
pub struct Config {
    // ========== Network Settings ==========
    pub rpc_url: String,
    pub chain_id: u64,

    // ========== Credentials ==========
    /// Signing key (KEEP SECRET!)
    pub private_key: Option<String>,

    /// Enso quote API key
    pub enso_api_key: Option<String>,

    // ========== External Sources ==========
    pub backend_url: String,
    pub subgraph_url: String,
    pub enso_api_url: String,

    // ========== Timing ==========
    pub loop_interval: Duration,
    pub retry_interval: Duration,
    pub confirmation_timeout: Duration,

    // ========== Retry & Slippage ==========
    /// Failed attempts that may be retried per bault
    pub max_retries: u32,

    /// Slippage on the first quote (bps)
    pub compound_slippage_bps: u32,

    /// Upper bound for widened slippage (bps)
    pub max_compound_slippage_bps: u32,

    /// Widening applied per retry (bps)
    pub slippage_increment_bps: u32,

    /// Safety discount on price-index valuations (bps, must be < 10000)
    pub wrapper_slippage_bps: u32,

    // ========== Eligibility ==========
    /// Baults with earned reward at or below this (wei) are skipped
    pub min_earned_reward: U256,

    /// Only consider the default wrapper
    pub only_allow_default_wrapper: bool,
    pub default_wrapper: Address,

    /// Bault allow-list (empty = all)
    pub only_vaults: Vec<Address>,

    /// Staking token allow-list (empty = all)
    pub only_staking_tokens: Vec<Address>,

    // ========== Execution ==========
    pub execution_mode: ExecutionMode,
    pub bounty_helper: Address,

    /// Surplus recipient; the signer when unset
    pub beneficiary: Option<Address>,

    pub gas_limit: u64,
    pub priority_fee_gwei: f64,
    pub base_fee_multiplier: u64,

    // ========== Safety ==========
    /// Native balance (wei) that must remain before each compound
    pub min_native_balance: U256,

    /// Consecutive failed cycles before the process exits
    pub max_consecutive_failures: u32,

    // ========== Logging ==========
    /// JSON-lines log of every cycle summary
    pub cycle_log_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            // Network
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),
            chain_id: env_parse("CHAIN_ID", defaults.chain_id)?,

            // Credentials
            private_key: non_empty_var("PRIVATE_KEY"),
            enso_api_key: non_empty_var("ENSO_API_KEY"),

            // Sources
            backend_url: env::var("BACKEND_URL").unwrap_or(defaults.backend_url),
            subgraph_url: env::var("SUBGRAPH_URL").unwrap_or(defaults.subgraph_url),
            enso_api_url: env::var("ENSO_API_URL").unwrap_or(defaults.enso_api_url),

            // Timing
            loop_interval: Duration::from_millis(env_parse("LOOP_INTERVAL_MS", 20_000)?),
            retry_interval: Duration::from_millis(env_parse("RETRY_INTERVAL_MS", 10_000)?),
            confirmation_timeout: Duration::from_secs(env_parse("CONFIRMATION_TIMEOUT_SECS", 10)?),

            // Retry & slippage
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries)?,
            compound_slippage_bps: env_parse("COMPOUND_SLIPPAGE_BPS", defaults.compound_slippage_bps)?,
            max_compound_slippage_bps: env_parse(
                "MAX_COMPOUND_SLIPPAGE_BPS",
                defaults.max_compound_slippage_bps,
            )?,
            slippage_increment_bps: env_parse("SLIPPAGE_INCREMENT_BPS", defaults.slippage_increment_bps)?,
            wrapper_slippage_bps: env_parse("WRAPPER_SLIPPAGE_BPS", defaults.wrapper_slippage_bps)?,

            // Eligibility
            min_earned_reward: match env::var("MIN_EARNED_REWARD") {
                Ok(v) => parse_ether(v.trim())
                    .map_err(|e| eyre!("Invalid MIN_EARNED_REWARD '{}': {}", v, e))?,
                Err(_) => defaults.min_earned_reward,
            },
            only_allow_default_wrapper: env_parse("ONLY_ALLOW_DEFAULT_WRAPPER", false)?,
            default_wrapper: match env::var("DEFAULT_WRAPPER") {
                Ok(v) => tokens::parse_wrapper(&v)
                    .ok_or_else(|| eyre!("Unknown DEFAULT_WRAPPER '{}'", v))?,
                Err(_) => DEFAULT_WRAPPER,
            },
            only_vaults: parse_address_list("ONLY_VAULT_ADDRESSES")?,
            only_staking_tokens: parse_address_list("ONLY_STAKING_TOKEN_ADDRESSES")?,

            // Execution
            execution_mode: if env_parse("EXECUTE", true)? {
                ExecutionMode::Execute
            } else {
                ExecutionMode::DryRun
            },
            bounty_helper: match non_empty_var("BOUNTY_HELPER_ADDRESS") {
                Some(v) => Address::from_str(&v)
                    .map_err(|e| eyre!("Invalid BOUNTY_HELPER_ADDRESS: {}", e))?,
                None => DEFAULT_BOUNTY_HELPER,
            },
            beneficiary: non_empty_var("BENEFICIARY_ADDRESS")
                .map(|v| Address::from_str(&v))
                .transpose()
                .map_err(|e| eyre!("Invalid BENEFICIARY_ADDRESS: {}", e))?,
            gas_limit: env_parse("GAS_LIMIT", defaults.gas_limit)?,
            priority_fee_gwei: env_parse("PRIORITY_FEE_GWEI", defaults.priority_fee_gwei)?,
            base_fee_multiplier: env_parse("BASE_FEE_MULTIPLIER", defaults.base_fee_multiplier)?,

            // Safety
            min_native_balance: match env::var("MIN_NATIVE_BALANCE") {
                Ok(v) => parse_ether(v.trim())
                    .map_err(|e| eyre!("Invalid MIN_NATIVE_BALANCE '{}': {}", v, e))?,
                Err(_) => defaults.min_native_balance,
            },
            max_consecutive_failures: env_parse(
                "MAX_CONSECUTIVE_FAILURES",
                defaults.max_consecutive_failures,
            )?,

            cycle_log_path: non_empty_var("CYCLE_LOG_PATH"),
        })
    }

    /// Validate configuration before the first cycle
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(eyre!("RPC_URL is empty"));
        }
        if self.private_key.is_none() {
            return Err(eyre!("PRIVATE_KEY is required"));
        }
        if self.enso_api_key.is_none() {
            return Err(eyre!("ENSO_API_KEY is required"));
        }

        for (name, bps) in [
            ("COMPOUND_SLIPPAGE_BPS", self.compound_slippage_bps),
            ("MAX_COMPOUND_SLIPPAGE_BPS", self.max_compound_slippage_bps),
            ("WRAPPER_SLIPPAGE_BPS", self.wrapper_slippage_bps),
        ] {
            if bps >= BASIS_POINTS {
                return Err(eyre!("{} must be below {} (currently {})", name, BASIS_POINTS, bps));
            }
        }

        if self.compound_slippage_bps > self.max_compound_slippage_bps {
            return Err(eyre!(
                "COMPOUND_SLIPPAGE_BPS ({}) exceeds MAX_COMPOUND_SLIPPAGE_BPS ({})",
                self.compound_slippage_bps,
                self.max_compound_slippage_bps
            ));
        }

        if !tokens::is_wrapper(&self.default_wrapper) {
            return Err(eyre!("DEFAULT_WRAPPER {:?} is not a known BGT wrapper", self.default_wrapper));
        }

        if self.gas_limit == 0 {
            return Err(eyre!("GAS_LIMIT must be positive"));
        }

        Ok(())
    }

    pub fn slippage_schedule(&self) -> SlippageSchedule {
        SlippageSchedule {
            base_bps: self.compound_slippage_bps,
            increment_bps: self.slippage_increment_bps,
            max_bps: self.max_compound_slippage_bps,
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              BAULT COMPOUNDER - CONFIGURATION              ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Execution Mode:    {:^40} ║", self.execution_mode);
        println!("║ Chain ID:          {:^40} ║", self.chain_id);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ TIMING                                                     ║");
        println!("║ • Loop Interval:   {:>37}ms ║", self.loop_interval.as_millis());
        println!("║ • Retry Interval:  {:>37}ms ║", self.retry_interval.as_millis());
        println!("║ • Max Retries:     {:^40} ║", self.max_retries);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SLIPPAGE (bps)                                             ║");
        println!("║ • Base / Max:      {:^40} ║",
            format!("{} / {}", self.compound_slippage_bps, self.max_compound_slippage_bps));
        println!("║ • Per Retry:       {:^40} ║", self.slippage_increment_bps);
        println!("║ • Index Discount:  {:^40} ║", self.wrapper_slippage_bps);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ ELIGIBILITY                                                ║");
        println!("║ • Min Earned:      {:^40} ║",
            crate::report::format_readable_amount(self.min_earned_reward));
        println!("║ • Default Only:    {:^40} ║",
            if self.only_allow_default_wrapper { tokens::symbol_of(&self.default_wrapper) } else { "✗ Best of all".to_string() });
        println!("║ • Vault Filter:    {:^40} ║", list_summary(&self.only_vaults));
        println!("║ • Token Filter:    {:^40} ║", list_summary(&self.only_staking_tokens));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CREDENTIALS                                                ║");
        println!("║ • Private Key:     {:^40} ║",
            if self.private_key.is_some() { "✓ Configured" } else { "✗ Not Set" });
        println!("║ • Enso API Key:    {:^40} ║",
            if self.enso_api_key.is_some() { "✓ Configured" } else { "✗ Not Set" });
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: BERACHAIN_CHAIN_ID,
            private_key: None,
            enso_api_key: None,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            subgraph_url: DEFAULT_SUBGRAPH_URL.to_string(),
            enso_api_url: DEFAULT_ENSO_API_URL.to_string(),
            loop_interval: Duration::from_secs(20),
            retry_interval: Duration::from_secs(10),
            confirmation_timeout: Duration::from_secs(10),
            max_retries: 0,
            compound_slippage_bps: 20,
            max_compound_slippage_bps: 100,
            slippage_increment_bps: 15,
            wrapper_slippage_bps: 100,
            min_earned_reward: U256::from(1_000_000_000_000_000_000u128),
            only_allow_default_wrapper: false,
            default_wrapper: DEFAULT_WRAPPER,
            only_vaults: vec![],
            only_staking_tokens: vec![],
            execution_mode: ExecutionMode::Execute,
            bounty_helper: DEFAULT_BOUNTY_HELPER,
            beneficiary: None,
            gas_limit: 10_000_000,
            priority_fee_gwei: 0.1,
            base_fee_multiplier: 10,
            min_native_balance: U256::from(100_000_000_000_000_000u128),
            max_consecutive_failures: 5,
            cycle_log_path: None,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Unset or blank falls back to the default; anything unparsable is an error
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        Some(v) => v.parse().map_err(|e| eyre!("Invalid {} '{}': {}", key, v, e)),
        None => Ok(default),
    }
}

fn parse_address_list(key: &str) -> Result<Vec<Address>> {
    match non_empty_var(key) {
        Some(raw) => split_addresses(&raw).map_err(|e| eyre!("Invalid {}: {}", key, e)),
        None => Ok(vec![]),
    }
}

/// Parse a comma-separated address list (case-insensitive)
pub fn split_addresses(raw: &str) -> Result<Vec<Address>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Address::from_str(s).map_err(|e| eyre!("'{}': {}", s, e)))
        .collect()
}

fn list_summary(list: &[Address]) -> String {
    if list.is_empty() {
        "✗ None".to_string()
    } else {
        format!("{} address(es)", list.len())
    }
}

// ============================================
// CYCLE LOGGER
// ============================================

/// One line of the JSON-lines cycle log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleLog {
    pub timestamp: DateTime<Utc>,
    pub block_number: u64,
    pub ineligible: usize,
    pub eligible: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub transactions: Vec<String>,
    pub total_ms: u128,
}

impl CycleLog {
    /// Append this log to a file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

// ============================================
// TESTS
// ============================================
