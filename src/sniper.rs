//! Event dispatcher
//!
//! Turns `PairCreated` events into candidate tokens and runs each one
//! through validation, the duplicate guard and the trade executor on its own
//! task. The dispatcher never waits on per-event work before taking the next
//! event.

use std::sync::Arc;

use ethers::types::Address;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{RuntimeSettings, TradingSettings};
use crate::error::{Error, Result};
use crate::filter::{CandidateToken, GateFailure, LegitimacyValidator};
use crate::stream::PairCreated;
use crate::trading::{TradeExecutor, TradeGuard, TradeResult};

/// The candidate in a pair, i.e. whichever side is not the base asset
pub fn candidate_from_event(event: &PairCreated, base_asset: Address) -> Option<CandidateToken> {
    let token = if event.token0 == base_asset {
        event.token1
    } else if event.token1 == base_asset {
        event.token0
    } else {
        return None;
    };

    if token == base_asset {
        return None;
    }

    Some(CandidateToken {
        token,
        pair: event.pair,
    })
}

/// What happened to one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rejected(GateFailure),
    /// Another task already claimed this token
    Duplicate,
    Traded(TradeResult),
    TradeFailed(TradeResult),
}

pub struct Sniper {
    settings: Arc<RuntimeSettings>,
    base_asset: Address,
    validator: Arc<LegitimacyValidator>,
    guard: Arc<TradeGuard>,
    executor: Arc<TradeExecutor>,
}

impl Sniper {
    pub fn new(
        settings: Arc<RuntimeSettings>,
        base_asset: Address,
        validator: Arc<LegitimacyValidator>,
        guard: Arc<TradeGuard>,
        executor: Arc<TradeExecutor>,
    ) -> Self {
        Self {
            settings,
            base_asset,
            validator,
            guard,
            executor,
        }
    }

    /// Decide whether an event produces work. Returns the candidate and the
    /// settings snapshot it must be processed with.
    pub fn accept(&self, event: &PairCreated) -> Option<(CandidateToken, TradingSettings)> {
        let snapshot = self.settings.snapshot();
        if !snapshot.running {
            info!(pair = ?event.pair, "Bot stopped, ignoring new pair");
            return None;
        }

        match candidate_from_event(event, self.base_asset) {
            Some(candidate) => Some((candidate, snapshot.trading)),
            None => {
                debug!(pair = ?event.pair, "Pair does not contain the base asset");
                None
            }
        }
    }

    /// Validate, claim and trade one candidate
    pub async fn process(&self, candidate: CandidateToken, settings: TradingSettings) -> Outcome {
        info!(token = ?candidate.token, pair = ?candidate.pair, "Evaluating new token");

        let report = self.validator.validate(&candidate, &settings).await;
        if let Some(failure) = report.failed {
            return Outcome::Rejected(failure);
        }

        if !self.guard.try_claim(candidate.token) {
            info!(token = ?candidate.token, "Trade already in flight or recent, skipping");
            return Outcome::Duplicate;
        }

        let result = self.executor.execute_trade(candidate.token, &settings).await;
        if result.success {
            return Outcome::Traded(result);
        }

        // A broadcast swap may still be mined; keep the claim for the window
        if result.broadcast {
            warn!(
                token = ?candidate.token,
                tx_hash = ?result.tx_hash,
                "Trade outcome unknown, keeping token claimed"
            );
        } else {
            self.guard.release(candidate.token);
        }
        Outcome::TradeFailed(result)
    }

    /// Dispatch events until shutdown or until the listener hangs up.
    ///
    /// A panic inside an event task is returned as an error.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<PairCreated>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("Event channel closed");
                        break;
                    };
                    self.guard.prune();
                    if let Some((candidate, settings)) = self.accept(&event) {
                        let sniper = self.clone();
                        tasks.spawn(async move { sniper.process(candidate, settings).await });
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    reap(joined)?;
                }
                _ = shutdown.cancelled() => {
                    info!(claimed = self.guard.len(), "Dispatcher shutting down");
                    break;
                }
            }
        }

        if !tasks.is_empty() {
            info!("Waiting for {} in-flight evaluations", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            reap(joined)?;
        }

        Ok(())
    }
}

fn reap(joined: std::result::Result<Outcome, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(Outcome::Traded(result)) => {
            debug!(tx_hash = ?result.tx_hash, "Event task finished with a trade");
            Ok(())
        }
        Ok(Outcome::TradeFailed(result)) => {
            warn!(error = ?result.error, "Event task finished with a failed trade");
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) if e.is_panic() => {
            error!("Event task panicked: {}", e);
            Err(Error::Internal(format!("event task panicked: {}", e)))
        }
        Err(e) => {
            warn!("Event task cancelled: {}", e);
            Ok(())
        }
    }
}
