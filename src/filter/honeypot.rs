//! Honeypot detection by simulated round trip
//!
//! A token is simulated as a buy from the base asset followed by a sell of
//! the quoted output back into the base asset, both via `eth_call` so no
//! state changes. A token that can be bought but not sold is a honeypot.
//!
//! The sell leg runs against the head block, where the buy never happened.
//! [`ChainClient::simulate_swap`] funds the wallet with the input amount and
//! the router allowance through state overrides so the sell sees post-buy
//! balances.

use std::sync::Arc;

use ethers::types::{Address, U256};
use serde::Deserialize;
use tracing::{debug, info};

use crate::chain::{deadline_from_now, ChainClient, SimulationError, SwapRequest};
use crate::error::{Error, Result};

/// How to treat a simulation that failed without any revert payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguousRevertPolicy {
    /// Treat the token as a honeypot
    #[default]
    Reject,
    /// Treat the token as sellable
    Accept,
}

/// Outcome of a round-trip simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoneypotVerdict {
    Safe,
    Honeypot { reason: String },
    /// A leg failed but the node gave no revert data to judge by
    Inconclusive { reason: String },
}

impl HoneypotVerdict {
    /// Collapse the verdict into "is this a honeypot" under `policy`
    pub fn is_honeypot(&self, policy: AmbiguousRevertPolicy) -> bool {
        match self {
            HoneypotVerdict::Safe => false,
            HoneypotVerdict::Honeypot { .. } => true,
            HoneypotVerdict::Inconclusive { .. } => policy == AmbiguousRevertPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Leg {
    Buy,
    Sell,
}

impl Leg {
    fn as_str(&self) -> &'static str {
        match self {
            Leg::Buy => "buy",
            Leg::Sell => "sell",
        }
    }
}

/// Round-trip swap simulator
pub struct HoneypotSimulator {
    chain: Arc<dyn ChainClient>,
    base_asset: Address,
    fee: u32,
    deadline_secs: u64,
}

impl HoneypotSimulator {
    pub fn new(chain: Arc<dyn ChainClient>, base_asset: Address, fee: u32, deadline_secs: u64) -> Self {
        Self {
            chain,
            base_asset,
            fee,
            deadline_secs,
        }
    }

    /// Simulate buying `token` with `amount_in` base asset and selling it back.
    ///
    /// Transport failures are returned as errors, never as a verdict.
    pub async fn is_honeypot(&self, token: Address, amount_in: U256) -> Result<HoneypotVerdict> {
        let recipient = self.chain.wallet_address();
        let buy = SwapRequest {
            token_in: self.base_asset,
            token_out: token,
            fee: self.fee,
            recipient,
            deadline: deadline_from_now(self.deadline_secs),
            amount_in,
            amount_out_minimum: U256::zero(),
            value: amount_in,
        };

        let bought = match self.chain.simulate_swap(&buy).await {
            Ok(amount) => amount,
            Err(e) => return verdict_from_failure(Leg::Buy, e),
        };

        if bought.is_zero() {
            info!(token = ?token, "Buy simulation returned zero tokens");
            return Ok(HoneypotVerdict::Honeypot {
                reason: "buy returns zero tokens".into(),
            });
        }

        let sell = SwapRequest {
            token_in: token,
            token_out: self.base_asset,
            fee: self.fee,
            recipient,
            deadline: deadline_from_now(self.deadline_secs),
            amount_in: bought,
            amount_out_minimum: U256::zero(),
            value: U256::zero(),
        };

        match self.chain.simulate_swap(&sell).await {
            Ok(returned) => {
                debug!(token = ?token, %bought, %returned, "Round trip simulated");
                Ok(HoneypotVerdict::Safe)
            }
            Err(e) => verdict_from_failure(Leg::Sell, e),
        }
    }
}

fn verdict_from_failure(leg: Leg, error: SimulationError) -> Result<HoneypotVerdict> {
    match error {
        SimulationError::Reverted(reason) => Ok(HoneypotVerdict::Honeypot {
            reason: format!("{} reverted: {}", leg.as_str(), reason),
        }),
        SimulationError::MissingRevertData(detail) => Ok(HoneypotVerdict::Inconclusive {
            reason: format!("{} failed without revert data: {}", leg.as_str(), detail),
        }),
        SimulationError::Transport(detail) => Err(Error::Rpc(format!(
            "{} simulation did not complete: {}",
            leg.as_str(),
            detail
        ))),
    }
}
