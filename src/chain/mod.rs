//! Chain access
//!
//! Everything the bot needs from the chain goes through [`ChainClient`]:
//! point-in-time reads against the head block, non-committing swap
//! simulation, and swap submission. The production implementation is
//! [`EthersChain`]; tests substitute an in-memory fake.

pub mod contracts;
pub mod ethers_client;
pub mod funding;

use async_trait::async_trait;
use ethers::types::{Address, TxHash, U256};
use thiserror::Error;

use crate::error::{Error, Result};

pub use contracts::PairCreatedFilter;
pub use ethers_client::{connect, load_wallet, EthersChain, WsSigner};

/// Reserve snapshot of a V2-style pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairReserves {
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
}

impl PairReserves {
    /// Reserve held for `token`, or `None` if the pair does not contain it
    pub fn reserve_of(&self, token: Address) -> Option<U256> {
        if self.token0 == token {
            Some(self.reserve0)
        } else if self.token1 == token {
            Some(self.reserve1)
        } else {
            None
        }
    }
}

/// Parameters of a single-hop `exactInputSingle` swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub token_in: Address,
    pub token_out: Address,
    pub fee: u32,
    pub recipient: Address,
    /// Unix timestamp after which the router rejects the swap
    pub deadline: U256,
    pub amount_in: U256,
    /// Zero disables slippage protection
    pub amount_out_minimum: U256,
    /// Native value attached to the call (router wraps it when `token_in` is WETH)
    pub value: U256,
}

/// Mined transaction outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
    pub gas_used: Option<U256>,
}

/// Why an `eth_call` simulation did not return a value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimulationError {
    /// The contract reverted with a reason or custom error
    #[error("reverted: {0}")]
    Reverted(String),
    /// The call failed without any revert payload; the node could not say why
    #[error("missing revert data: {0}")]
    MissingRevertData(String),
    /// The request never reached a verdict (connection, timeout, rate limit)
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Chain capabilities used by the gates and the trade executor
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the trading wallet
    fn wallet_address(&self) -> Address;

    async fn pair_reserves(&self, pair: Address) -> Result<PairReserves>;

    async fn token_owner(&self, token: Address) -> Result<Address>;

    async fn total_supply(&self, token: Address) -> Result<U256>;

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256>;

    async fn token_symbol(&self, token: Address) -> Result<String>;

    /// Dry-run a swap through the router; returns the quoted output amount.
    ///
    /// The wallet is treated as already holding `amount_in` of `token_in`
    /// with the router approved, so a sell can be simulated without a mined buy.
    async fn simulate_swap(&self, request: &SwapRequest) -> std::result::Result<U256, SimulationError>;

    /// Sign and broadcast a swap; returns once the node accepted it
    async fn submit_swap(&self, request: &SwapRequest) -> Result<TxHash>;

    /// Wait until `tx_hash` is mined with the configured confirmations
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<SwapReceipt>;
}

/// Sort a failed call into [`SimulationError`] buckets.
///
/// `revert_data` is the raw payload the node returned, if any, and
/// `decoded_reason` the `Error(string)` reason when it could be decoded.
pub fn classify_call_failure(
    message: &str,
    revert_data: Option<&[u8]>,
    decoded_reason: Option<String>,
) -> SimulationError {
    let lower = message.to_lowercase();

    match revert_data {
        Some(data) if !data.is_empty() => {
            let reason = decoded_reason
                .unwrap_or_else(|| format!("0x{}", hex_prefix(data)));
            return SimulationError::Reverted(reason);
        }
        Some(_) => return SimulationError::MissingRevertData(message.to_string()),
        None => {}
    }

    if lower.contains("missing revert data") {
        return SimulationError::MissingRevertData(message.to_string());
    }

    if let Some(idx) = lower.find("execution reverted") {
        let rest = message.get(idx + "execution reverted".len()..).unwrap_or_default();
        return match rest.strip_prefix(':').map(str::trim) {
            Some(reason) if !reason.is_empty() => SimulationError::Reverted(reason.to_string()),
            _ => SimulationError::MissingRevertData(message.to_string()),
        };
    }

    const TRANSPORT_MARKERS: [&str; 7] = [
        "connection",
        "timed out",
        "timeout",
        "websocket",
        "rate limit",
        "too many requests",
        "429",
    ];
    if TRANSPORT_MARKERS.iter().any(|m| lower.contains(m)) {
        return SimulationError::Transport(message.to_string());
    }

    SimulationError::Reverted(message.to_string())
}

/// Convert a human ETH amount into wei
pub fn eth_to_wei(amount_eth: f64) -> Result<U256> {
    if !amount_eth.is_finite() || amount_eth < 0.0 {
        return Err(Error::Config(format!("invalid ETH amount: {}", amount_eth)));
    }
    ethers::utils::parse_ether(amount_eth)
        .map_err(|e| Error::Config(format!("invalid ETH amount {}: {}", amount_eth, e)))
}

/// Unix timestamp `secs` from now, as the router expects it
pub fn deadline_from_now(secs: u64) -> U256 {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    U256::from(now.saturating_add(secs))
}

fn hex_prefix(data: &[u8]) -> String {
    data.iter().take(36).map(|b| format!("{:02x}", b)).collect()
}
