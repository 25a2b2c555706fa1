//! Ordered gate driver

use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::gates::{
    Gate, GateKind, GateOutcome, HoneypotGate, OwnershipGate, SentimentGate, SupplyGate, VerificationGate,
};
use super::honeypot::HoneypotSimulator;
use super::liquidity::LiquidityGate;
use super::CandidateToken;
use crate::chain::ChainClient;
use crate::config::{Config, TradingSettings};
use crate::oracle::Oracle;

/// First failing gate and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateFailure {
    pub gate: GateKind,
    pub reason: String,
}

/// Outcome of a validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub failed: Option<GateFailure>,
    /// Gates that ran, in order. Gates after a failure are absent.
    pub evaluated: Vec<GateKind>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.failed.is_none()
    }
}

/// Runs gates in order and stops at the first failure.
///
/// A gate that errors or overruns its deadline counts as failed.
pub struct LegitimacyValidator {
    gates: Vec<Arc<dyn Gate>>,
    gate_timeout: Duration,
}

/// Per-gate deadline unless configured otherwise
const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(30);

impl LegitimacyValidator {
    pub fn new(gates: Vec<Arc<dyn Gate>>) -> Self {
        Self {
            gates,
            gate_timeout: DEFAULT_GATE_TIMEOUT,
        }
    }

    pub fn with_gate_timeout(mut self, gate_timeout: Duration) -> Self {
        self.gate_timeout = gate_timeout;
        self
    }

    /// The six production gates in their fixed order
    pub fn standard(
        chain: Arc<dyn ChainClient>,
        oracle: Arc<dyn Oracle>,
        base_asset: Address,
        config: &Config,
    ) -> Self {
        let simulator = HoneypotSimulator::new(
            chain.clone(),
            base_asset,
            config.trading.fee_tier,
            config.trading.deadline_secs,
        );

        Self::new(vec![
            Arc::new(LiquidityGate::new(chain.clone(), base_asset)),
            Arc::new(HoneypotGate::new(simulator, config.filters.ambiguous_revert_policy)),
            Arc::new(VerificationGate::new(oracle.clone())),
            Arc::new(OwnershipGate::new(chain.clone())),
            Arc::new(SupplyGate::new(chain.clone(), config.filters.max_supply_fraction)),
            Arc::new(SentimentGate::new(
                chain,
                oracle,
                config.filters.sentiment_keywords.clone(),
                config.filters.sentiment_query_suffix.clone(),
                config.filters.sentiment_threshold,
            )),
        ])
        .with_gate_timeout(Duration::from_secs(config.filters.gate_timeout_secs))
    }

    pub fn gate_kinds(&self) -> Vec<GateKind> {
        self.gates.iter().map(|g| g.kind()).collect()
    }

    pub async fn validate(&self, candidate: &CandidateToken, settings: &TradingSettings) -> ValidationReport {
        let mut evaluated = Vec::with_capacity(self.gates.len());

        for gate in &self.gates {
            let kind = gate.kind();
            evaluated.push(kind);

            let checked = tokio::time::timeout(self.gate_timeout, gate.check(candidate, settings)).await;

            let reason = match checked {
                Ok(Ok(GateOutcome::Pass)) => {
                    debug!(token = ?candidate.token, gate = %kind, "Gate passed");
                    continue;
                }
                Ok(Ok(GateOutcome::Fail(reason))) => reason,
                Err(_) => {
                    warn!(
                        token = ?candidate.token,
                        gate = %kind,
                        timeout_ms = self.gate_timeout.as_millis() as u64,
                        "Gate timed out, rejecting"
                    );
                    format!("timed out after {:?}", self.gate_timeout)
                }
                Ok(Err(e)) => {
                    warn!(
                        token = ?candidate.token,
                        gate = %kind,
                        transient = e.is_retryable(),
                        error = %e,
                        "Gate errored, rejecting"
                    );
                    format!("error: {}", e)
                }
            };

            info!(token = ?candidate.token, gate = %kind, %reason, "Token rejected");
            return ValidationReport {
                failed: Some(GateFailure { gate: kind, reason }),
                evaluated,
            };
        }

        info!(token = ?candidate.token, pair = ?candidate.pair, "Token passed all gates");
        ValidationReport {
            failed: None,
            evaluated,
        }
    }
}
