//! CLI command implementations

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chain::{self, ChainClient};
use crate::config::{Config, RuntimeSettings};
use crate::filter::LegitimacyValidator;
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::oracle::{HttpOracle, Oracle};
use crate::position::{Ledger, PositionStatus, Revaluator};
use crate::sniper::Sniper;
use crate::stream::{ListenerConfig, PairCreatedListener};
use crate::trading::{TradeExecutor, TradeGuard};

/// Start the sniper bot
pub async fn start(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        warn!("Running in DRY-RUN mode - no real trades will be executed");
    }

    info!("Starting pair sniper...");
    info!(
        "Trade amount: {} ETH, min liquidity: {} ETH, stop-loss: {}%",
        config.trading.trade_amount_eth,
        config.filters.min_liquidity_eth,
        config.positions.stop_loss_fraction * 100.0
    );

    let base_asset = config.base_asset_address()?;
    let factory = config.factory_address()?;

    // Chain client
    info!("Connecting to RPC...");
    let wallet = chain::load_wallet(config.rpc.chain_id).context("Failed to load trading wallet")?;
    let chain: Arc<dyn ChainClient> = Arc::new(
        chain::connect(config, wallet)
            .await
            .context("Failed to connect to RPC")?,
    );
    info!("Trading wallet: {:?}", chain.wallet_address());

    let oracle: Arc<dyn Oracle> = Arc::new(HttpOracle::new(&config.oracle)?);

    info!("Loading positions...");
    let ledger = Arc::new(
        Ledger::open(&config.positions.ledger_path)
            .await
            .context("Failed to open trade ledger")?,
    );

    let notifiers = build_notifiers(config)?;
    info!(
        "Notifiers: {}",
        notifiers.iter().map(|n| n.name()).collect::<Vec<_>>().join(", ")
    );

    let settings = Arc::new(RuntimeSettings::from_config(config));
    let validator = Arc::new(LegitimacyValidator::standard(
        chain.clone(),
        oracle.clone(),
        base_asset,
        config,
    ));
    let guard = Arc::new(TradeGuard::new(Duration::from_secs(config.trading.dedup_window_secs)));
    let executor = Arc::new(
        TradeExecutor::new(chain.clone(), oracle.clone(), ledger.clone(), notifiers, base_asset, config)
            .with_dry_run(dry_run),
    );
    let sniper = Arc::new(Sniper::new(settings.clone(), base_asset, validator, guard, executor));

    let shutdown = CancellationToken::new();
    spawn_ctrl_c(shutdown.clone());

    // Pair discovery
    let (event_tx, event_rx) = mpsc::channel(config.backpressure.channel_capacity);
    let listener = PairCreatedListener::new(
        ListenerConfig {
            ws_endpoints: config.ws_endpoints(),
            factory,
            initial_reconnect_delay: Duration::from_millis(config.rpc.reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(config.rpc.max_reconnect_delay_ms),
        },
        event_tx,
    );
    let listener_handle = tokio::spawn(listener.run(shutdown.clone()));

    // Revaluation loop
    let revaluator = Revaluator::new(
        ledger.clone(),
        oracle.clone(),
        settings.clone(),
        Duration::from_secs(config.positions.revaluation_interval_secs),
    );
    let revaluation_handle = tokio::spawn(revaluator.run(shutdown.clone()));

    info!("Sniper running. Press Ctrl+C to stop.");
    let result = sniper.run(event_rx, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = listener_handle.await {
        error!("Listener task failed: {}", e);
    }
    if let Err(e) = revaluation_handle.await {
        error!("Revaluation task failed: {}", e);
    }

    result?;
    info!("Sniper stopped");
    Ok(())
}

fn build_notifiers(config: &Config) -> Result<Vec<Arc<dyn Notifier>>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if config.notifications.log_enabled {
        notifiers.push(Arc::new(LogNotifier));
    }

    let token = &config.notifications.telegram_bot_token;
    let chat_id = &config.notifications.telegram_chat_id;
    match (token.is_empty(), chat_id.is_empty()) {
        (false, false) => {
            notifiers.push(Arc::new(TelegramNotifier::new(token.clone(), chat_id.clone())?));
        }
        (false, true) | (true, false) => {
            warn!("Telegram needs both TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID - disabled");
        }
        (true, true) => {}
    }

    Ok(notifiers)
}

fn spawn_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        shutdown.cancel();
    });
}

/// Show ledger summary and the most recent positions
pub async fn status(config: &Config) -> Result<()> {
    let ledger = Ledger::open(&config.positions.ledger_path)
        .await
        .context("Failed to open trade ledger")?;
    let positions = ledger.positions().await?;
    let summary = crate::position::LedgerSummary::from_positions(&positions);

    println!("\n=== SNIPER STATUS ===\n");
    println!("Ledger: {}", ledger.path().display());
    println!("Positions: {} ({} open, {} closed)", summary.total, summary.open, summary.closed);
    println!(
        "Profitable: {}  Unprofitable: {}",
        summary.profitable, summary.unprofitable
    );
    println!("Net P&L: {:.4} USD", summary.net_profit_loss);

    println!("\n=== RECENT POSITIONS ===\n");
    if positions.is_empty() {
        println!("No positions.");
    }
    for p in positions.iter().rev().take(10) {
        let status = match p.status {
            PositionStatus::Open => "OPEN  ",
            PositionStatus::Closed => "CLOSED",
        };
        println!(
            "{} {:?}  in {} ETH  entry ${:.2}  now {}  P&L {}  {}",
            status,
            p.token_address,
            p.amount_invested,
            p.value_at_trade,
            p.current_value.map_or("-".to_string(), |v| format!("${:.2}", v)),
            p.profit_loss.map_or("-".to_string(), |v| format!("{:+.2}", v)),
            p.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
