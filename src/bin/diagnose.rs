//! Diagnostic tool - is this machine ready to compound?
//!
//! Reads the environment only; never touches the network.
//!
//! Run with: cargo run --bin diagnose

use std::env;

fn is_set(key: &str) -> bool {
    env::var(key).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn section(title: &str) {
    println!("\n═══════════════════════════════════════════════════");
    println!("  {}", title);
    println!("═══════════════════════════════════════════════════\n");
}

fn main() {
    println!("🔍 BAULT COMPOUNDER DIAGNOSTIC CHECK");

    dotenvy::dotenv().ok();

    section("CREDENTIALS");

    let required = [
        ("PRIVATE_KEY", "Signs compound transactions"),
        ("ENSO_API_KEY", "Live swap quotes"),
    ];
    let mut missing = 0;
    for (key, desc) in required {
        let set = is_set(key);
        if !set {
            missing += 1;
        }
        println!("  {:<14} {}", key, if set { "✅ Set" } else { "❌ Not set" });
        println!("    └─ {}", desc);
    }

    section("CONFIGURATION");

    let knobs = [
        ("RPC_URL", "https://rpc.berachain.com"),
        ("LOOP_INTERVAL_MS", "20000"),
        ("RETRY_INTERVAL_MS", "10000"),
        ("MAX_RETRIES", "0"),
        ("COMPOUND_SLIPPAGE_BPS", "20"),
        ("MAX_COMPOUND_SLIPPAGE_BPS", "100"),
        ("SLIPPAGE_INCREMENT_BPS", "15"),
        ("WRAPPER_SLIPPAGE_BPS", "100"),
        ("MIN_EARNED_REWARD", "1.0"),
        ("ONLY_ALLOW_DEFAULT_WRAPPER", "false"),
        ("DEFAULT_WRAPPER", "iBGT"),
        ("MIN_NATIVE_BALANCE", "0.1"),
        ("MAX_CONSECUTIVE_FAILURES", "5"),
        ("EXECUTE", "true"),
    ];

    for (key, default) in knobs {
        match env::var(key) {
            Ok(value) => {
                let shown = if value.len() > 50 {
                    format!("{}...{}", &value[..30], &value[value.len() - 15..])
                } else {
                    value
                };
                println!("  {}: {} (from .env)", key, shown);
            }
            Err(_) => println!("  {}: {} (default)", key, default),
        }
    }

    for key in ["ONLY_VAULT_ADDRESSES", "ONLY_STAKING_TOKEN_ADDRESSES"] {
        let count = env::var(key)
            .map(|v| v.split(',').filter(|s| !s.trim().is_empty()).count())
            .unwrap_or(0);
        if count == 0 {
            println!("  {}: all", key);
        } else {
            println!("  {}: {} address(es)", key, count);
        }
    }

    println!(
        "  BENEFICIARY_ADDRESS: {}",
        if is_set("BENEFICIARY_ADDRESS") { "custom" } else { "signer (default)" }
    );

    section("STATUS");

    let execute = match env::var("EXECUTE").map(|v| v.trim().to_string()) {
        Ok(v) if !v.is_empty() => match v.parse::<bool>() {
            Ok(flag) => flag,
            Err(_) => {
                println!("  ❌ EXECUTE='{}' is not true/false; the compounder will refuse to start", v);
                missing += 1;
                true
            }
        },
        _ => true,
    };

    if missing > 0 {
        println!("  ❌ {} required variable(s) missing or invalid; the compounder will refuse to start", missing);
    } else if execute {
        println!("  🚀 EXECUTE MODE");
        println!("     → Eligible baults WILL be compounded on-chain");
        println!("     → Gas is paid from the signer wallet");
    } else {
        println!("  📋 DRY RUN MODE");
        println!("     → Full pipeline, live quotes, no transactions");
    }

    println!("\n✅ Diagnostic complete!\n");
}
