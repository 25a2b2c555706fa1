//! Periodic revaluation of open positions with stop-loss closing

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use futures::future::join_all;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ledger::{Ledger, Position, PositionStatus};
use crate::config::RuntimeSettings;
use crate::error::Result;
use crate::oracle::Oracle;

/// Counters for one revaluation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub open: usize,
    pub revalued: usize,
    pub closed: usize,
}

/// Apply a fresh `price` to an open position.
///
/// Returns true when this call closed the position. Closed positions are
/// left untouched.
pub fn apply_price(position: &mut Position, price: f64, stop_loss_fraction: f64) -> bool {
    if !position.is_open() {
        return false;
    }

    let current = price * position.amount_invested;
    let pnl = current - position.value_at_trade;
    position.current_value = Some(current);
    position.profit_loss = Some(pnl);

    if pnl < -stop_loss_fraction * position.value_at_trade {
        position.status = PositionStatus::Closed;
        true
    } else {
        false
    }
}

pub struct Revaluator {
    ledger: Arc<Ledger>,
    oracle: Arc<dyn Oracle>,
    settings: Arc<RuntimeSettings>,
    interval: Duration,
}

impl Revaluator {
    pub fn new(
        ledger: Arc<Ledger>,
        oracle: Arc<dyn Oracle>,
        settings: Arc<RuntimeSettings>,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            oracle,
            settings,
            interval,
        }
    }

    /// Run cycles every `interval` until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting revaluation loop every {}s", self.interval.as_secs());

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(stats) if stats.open > 0 => info!(
                            open = stats.open,
                            revalued = stats.revalued,
                            closed = stats.closed,
                            "Revaluation cycle complete"
                        ),
                        Ok(_) => debug!("No open positions to revalue"),
                        Err(e) => error!("Revaluation cycle failed: {}", e),
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Revaluation loop stopped");
                    break;
                }
            }
        }
    }

    /// One revaluation pass.
    ///
    /// Prices are fetched outside the ledger lock; the ledger is re-read
    /// inside it so positions appended meanwhile are preserved.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let open = self.ledger.open_positions().await?;
        if open.is_empty() {
            return Ok(CycleStats::default());
        }

        let mut tokens: Vec<Address> = open.iter().map(|p| p.token_address).collect();
        tokens.sort();
        tokens.dedup();

        let lookups = tokens.iter().map(|token| {
            let oracle = self.oracle.clone();
            let token = *token;
            async move { (token, oracle.price(token).await) }
        });

        let mut prices = HashMap::with_capacity(tokens.len());
        for (token, result) in join_all(lookups).await {
            match result {
                Ok(Some(price)) if price.is_finite() => {
                    prices.insert(token, price);
                }
                Ok(_) => warn!(token = ?token, "No price available, position left unchanged"),
                Err(e) => warn!(token = ?token, error = %e, "Price lookup failed, position left unchanged"),
            }
        }

        let mut stats = CycleStats {
            open: open.len(),
            ..CycleStats::default()
        };
        if prices.is_empty() {
            return Ok(stats);
        }

        let stop_loss = self.settings.trading().stop_loss_fraction;
        let closed = self
            .ledger
            .update(|positions| {
                let mut closed = Vec::new();
                for position in positions.iter_mut().filter(|p| p.is_open()) {
                    let Some(price) = prices.get(&position.token_address) else {
                        continue;
                    };
                    stats.revalued += 1;
                    if apply_price(position, *price, stop_loss) {
                        closed.push(position.clone());
                    }
                }
                closed
            })
            .await?;

        for position in &closed {
            warn!(
                token = ?position.token_address,
                value_at_trade = position.value_at_trade,
                current_value = position.current_value.unwrap_or_default(),
                "Stop-loss hit, position closed"
            );
        }
        stats.closed = closed.len();

        Ok(stats)
    }
}
