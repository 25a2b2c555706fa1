//! Pair Sniper - buys freshly listed Uniswap pairs that pass a legitimacy screen
//!
//! # WARNING
//! - This bot trades with real money. Only use funds you can afford to lose.
//! - Swaps are sent with zero minimum output; there is no slippage protection.
//! - Most freshly listed tokens go to zero (rug pulls, abandonment).
//! - Passing every gate does not make a token safe.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use pair_sniper::chain;
use pair_sniper::cli::commands;
use pair_sniper::config::Config;

/// Pair Sniper - new-pair sniper with honeypot simulation
#[derive(Parser)]
#[command(name = "pair-sniper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sniper bot
    Start {
        /// Run in dry-run mode (validate but never submit a swap)
        #[arg(long)]
        dry_run: bool,
    },

    /// Show ledger summary and recent positions
    Status,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json_logs);

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Start { dry_run } => match startup_checks(&config, dry_run) {
            Ok(()) => commands::start(&config, dry_run).await,
            Err(e) => Err(e),
        },
        Commands::Status => commands::status(&config).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pair_sniper=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Perform startup safety checks
fn startup_checks(config: &Config, dry_run: bool) -> Result<()> {
    info!("Performing startup checks...");

    let wallet = chain::load_wallet(config.rpc.chain_id)?;
    info!("Wallet key OK ({:?})", ethers::signers::Signer::address(&wallet));

    if config.oracle.etherscan_api_key.is_empty() {
        warn!("ETHERSCAN_API_KEY not set - every token will fail the source_verified gate");
    }
    if config.oracle.google_api_key.is_empty() || config.oracle.google_cx.is_empty() {
        warn!("GOOGLE_API_KEY / GOOGLE_CX not set - every token will fail the sentiment gate");
    }

    if !dry_run {
        warn!(
            "LIVE trading: {} ETH per trade, amountOutMinimum = 0 (no slippage protection)",
            config.trading.trade_amount_eth
        );
    }

    info!("Startup checks passed");
    Ok(())
}
