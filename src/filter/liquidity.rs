//! Minimum base-asset liquidity gate

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::Address;
use tracing::debug;

use super::gates::{Gate, GateKind, GateOutcome};
use super::CandidateToken;
use crate::chain::{eth_to_wei, ChainClient};
use crate::config::TradingSettings;
use crate::error::Result;

/// Passes when the pair holds at least the configured base-asset reserve
pub struct LiquidityGate {
    chain: Arc<dyn ChainClient>,
    base_asset: Address,
}

impl LiquidityGate {
    pub fn new(chain: Arc<dyn ChainClient>, base_asset: Address) -> Self {
        Self { chain, base_asset }
    }
}

#[async_trait]
impl Gate for LiquidityGate {
    fn kind(&self) -> GateKind {
        GateKind::Liquidity
    }

    async fn check(&self, candidate: &CandidateToken, settings: &TradingSettings) -> Result<GateOutcome> {
        let reserves = self.chain.pair_reserves(candidate.pair).await?;
        let Some(reserve) = reserves.reserve_of(self.base_asset) else {
            return Ok(GateOutcome::fail("pair does not hold the base asset"));
        };

        let minimum = eth_to_wei(settings.min_liquidity_eth)?;
        debug!(pair = ?candidate.pair, %reserve, %minimum, "Liquidity check");

        if reserve >= minimum {
            Ok(GateOutcome::Pass)
        } else {
            Ok(GateOutcome::fail(format!(
                "base reserve {} wei below minimum {} wei",
                reserve, minimum
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::PairReserves;
    use crate::testing::{candidate, settings, FakeChain, TOKEN, WETH};
    use ethers::types::U256;

    fn reserves(weth_reserve: U256) -> PairReserves {
        PairReserves {
            token0: TOKEN,
            token1: WETH,
            reserve0: U256::from(1_000_000u64),
            reserve1: weth_reserve,
        }
    }

    #[tokio::test]
    async fn test_passes_at_exact_minimum() {
        let chain = Arc::new(FakeChain::new());
        chain.set_reserves(reserves(U256::exp10(17)));
        let gate = LiquidityGate::new(chain, WETH);

        let outcome = gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap();
        assert_eq!(outcome, GateOutcome::Pass);
    }

    #[tokio::test]
    async fn test_fails_below_minimum() {
        let chain = Arc::new(FakeChain::new());
        chain.set_reserves(reserves(U256::exp10(16)));
        let gate = LiquidityGate::new(chain, WETH);

        let outcome = gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap();
        assert!(matches!(outcome, GateOutcome::Fail(_)));
    }

    #[tokio::test]
    async fn test_fails_without_base_asset() {
        let chain = Arc::new(FakeChain::new());
        chain.set_reserves(PairReserves {
            token0: TOKEN,
            token1: Address::from_low_u64_be(0x1234),
            reserve0: U256::exp10(20),
            reserve1: U256::exp10(20),
        });
        let gate = LiquidityGate::new(chain, WETH);

        let outcome = gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap();
        assert!(matches!(outcome, GateOutcome::Fail(_)));
    }
}
