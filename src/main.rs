//! The Bault Compounder - keeps Kodiak baults compounding on Berachain
//!
//! Run with: cargo run -- [--no-execute] [--once] [--verbose]
//!
//! Every cycle:
//! - list baults from the Kodiak backend, read their on-chain state at one block
//! - pick the most valuable claim path (BGT wrapper or native WBERA)
//! - confirm profitability with a live Enso quote
//! - claim + swap + pay the bounty through the BountyHelper, one bault at a time

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod batcher;
mod chain;
mod config;
mod contracts;
mod eligibility;
mod executor;
mod gas_oracle;
mod pricing;
mod report;
mod scheduler;
mod selector;
mod sources;
mod tokens;
mod vault;

use chain::{RpcChain, Wallet};
use config::{Config, ExecutionMode};
use executor::ExecutorSettings;
use gas_oracle::GasOracle;
use scheduler::{PollingScheduler, SchedulerSettings};
use sources::{EnsoQuoter, KodiakBackend, SubgraphPriceIndex};

#[derive(Parser, Debug)]
#[command(name = "bault-compounder", about = "Automated bault compounder for Berachain")]
struct Cli {
    /// Run the full pipeline but never simulate or submit transactions
    #[arg(long)]
    no_execute: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Debug-level logging
    #[arg(long, short)]
    verbose: bool,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🐻 BAULT COMPOUNDER - Kodiak Bault Bounty Bot").cyan().bold()
    );
    println!(
        "{}",
        style("    Multicall reads | Wrapper selection | Enso routes").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let directive = if cli.verbose { "bault_compounder=debug" } else { "bault_compounder=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    print_banner();

    // Load configuration
    let mut config = Config::from_env()?;
    if cli.no_execute {
        config.execution_mode = ExecutionMode::DryRun;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e);
    }

    config.print_summary();
    println!();

    // ═══ WIRING ═══
    let private_key = config
        .private_key
        .as_deref()
        .ok_or_else(|| eyre!("PRIVATE_KEY is required"))?;
    let enso_key = config
        .enso_api_key
        .clone()
        .ok_or_else(|| eyre!("ENSO_API_KEY is required"))?;

    let wallet = Wallet::new(private_key, config.chain_id)?;
    let signer = wallet.address();
    let beneficiary = config.beneficiary.unwrap_or(signer);
    info!(
        "🔑 Signer: {:?} | Beneficiary: {:?} | Chain: {}",
        signer,
        beneficiary,
        wallet.chain_id()
    );

    let gas_oracle = GasOracle::new(
        config.rpc_url.clone(),
        config.base_fee_multiplier,
        config.priority_fee_gwei,
    );
    let chain = Arc::new(RpcChain::new(config.rpc_url.clone(), wallet, gas_oracle, config.gas_limit));

    let backend = Arc::new(KodiakBackend::new(
        config.backend_url.clone(),
        config.only_vaults.clone(),
        config.only_staking_tokens.clone(),
    )?);
    let prices = Arc::new(SubgraphPriceIndex::new(config.subgraph_url.clone())?);
    let quotes = Arc::new(EnsoQuoter::new(
        config.enso_api_url.clone(),
        enso_key,
        config.chain_id,
        config.bounty_helper,
    )?);

    let mut scheduler = PollingScheduler::new(
        backend,
        prices,
        quotes,
        chain,
        ExecutorSettings::from_config(&config, beneficiary),
        SchedulerSettings::from_config(&config),
    );

    match config.execution_mode {
        ExecutionMode::Execute => println!("{}", style("🚀 EXECUTE MODE - transactions will be sent").yellow().bold()),
        ExecutionMode::DryRun => println!("{}", style("📋 DRY RUN - no transactions will be sent").green()),
    }
    println!();

    scheduler.run(cli.once).await?;

    println!("{}", style("═══ COMPOUNDER STOPPED ═══").blue().bold());
    Ok(())
}
