//! Legitimacy gates
//!
//! Each gate answers one yes/no question about a candidate token. Gates are
//! stateless between calls and never cache a result.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, U256};
use serde::Serialize;
use tracing::{debug, warn};

use super::honeypot::{AmbiguousRevertPolicy, HoneypotSimulator, HoneypotVerdict};
use super::sentiment;
use super::CandidateToken;
use crate::chain::{eth_to_wei, ChainClient};
use crate::config::TradingSettings;
use crate::error::Result;
use crate::oracle::Oracle;

/// Gate names, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Liquidity,
    Honeypot,
    SourceVerified,
    OwnershipRenounced,
    SupplyConcentration,
    Sentiment,
}

impl GateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::Liquidity => "liquidity",
            GateKind::Honeypot => "honeypot",
            GateKind::SourceVerified => "source_verified",
            GateKind::OwnershipRenounced => "ownership_renounced",
            GateKind::SupplyConcentration => "supply_concentration",
            GateKind::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Pass,
    Fail(String),
}

impl GateOutcome {
    pub fn fail(reason: impl Into<String>) -> Self {
        GateOutcome::Fail(reason.into())
    }
}

/// A single legitimacy check
///
/// Returning `Err` is treated by the validator as a failure of this gate.
#[async_trait]
pub trait Gate: Send + Sync {
    fn kind(&self) -> GateKind;

    async fn check(&self, candidate: &CandidateToken, settings: &TradingSettings) -> Result<GateOutcome>;
}

/// Rejects tokens whose round-trip simulation marks them as a honeypot
pub struct HoneypotGate {
    simulator: HoneypotSimulator,
    policy: AmbiguousRevertPolicy,
}

impl HoneypotGate {
    pub fn new(simulator: HoneypotSimulator, policy: AmbiguousRevertPolicy) -> Self {
        Self { simulator, policy }
    }
}

#[async_trait]
impl Gate for HoneypotGate {
    fn kind(&self) -> GateKind {
        GateKind::Honeypot
    }

    async fn check(&self, candidate: &CandidateToken, settings: &TradingSettings) -> Result<GateOutcome> {
        let amount_in = eth_to_wei(settings.trade_amount_eth)?;
        let verdict = self.simulator.is_honeypot(candidate.token, amount_in).await?;

        if let HoneypotVerdict::Inconclusive { reason } = &verdict {
            warn!(token = ?candidate.token, policy = ?self.policy, %reason, "Ambiguous simulation failure");
        }

        if !verdict.is_honeypot(self.policy) {
            return Ok(GateOutcome::Pass);
        }

        Ok(match verdict {
            HoneypotVerdict::Honeypot { reason } => GateOutcome::Fail(reason),
            HoneypotVerdict::Inconclusive { reason } => {
                GateOutcome::Fail(format!("{} (ambiguous, rejected by policy)", reason))
            }
            HoneypotVerdict::Safe => GateOutcome::Pass,
        })
    }
}

/// Requires publicly verified source code
pub struct VerificationGate {
    oracle: Arc<dyn Oracle>,
}

impl VerificationGate {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl Gate for VerificationGate {
    fn kind(&self) -> GateKind {
        GateKind::SourceVerified
    }

    async fn check(&self, candidate: &CandidateToken, _settings: &TradingSettings) -> Result<GateOutcome> {
        let verification = self.oracle.verification(candidate.token).await?;
        if verification.verified {
            debug!(
                token = ?candidate.token,
                contract = verification.contract_name.as_deref().unwrap_or("?"),
                "Source verified"
            );
            Ok(GateOutcome::Pass)
        } else {
            Ok(GateOutcome::fail("source code is not verified"))
        }
    }
}

/// Requires `owner()` to be the zero address
pub struct OwnershipGate {
    chain: Arc<dyn ChainClient>,
}

impl OwnershipGate {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl Gate for OwnershipGate {
    fn kind(&self) -> GateKind {
        GateKind::OwnershipRenounced
    }

    async fn check(&self, candidate: &CandidateToken, _settings: &TradingSettings) -> Result<GateOutcome> {
        let owner = self.chain.token_owner(candidate.token).await?;
        if owner == Address::zero() {
            Ok(GateOutcome::Pass)
        } else {
            Ok(GateOutcome::fail(format!("owned by {:?}", owner)))
        }
    }
}

/// Caps the share of total supply held by the trading wallet
pub struct SupplyGate {
    chain: Arc<dyn ChainClient>,
    max_fraction: f64,
}

impl SupplyGate {
    pub fn new(chain: Arc<dyn ChainClient>, max_fraction: f64) -> Self {
        Self { chain, max_fraction }
    }
}

#[async_trait]
impl Gate for SupplyGate {
    fn kind(&self) -> GateKind {
        GateKind::SupplyConcentration
    }

    async fn check(&self, candidate: &CandidateToken, _settings: &TradingSettings) -> Result<GateOutcome> {
        let total = self.chain.total_supply(candidate.token).await?;
        if total.is_zero() {
            return Ok(GateOutcome::fail("total supply is zero"));
        }

        let holder = self.chain.wallet_address();
        let balance = self.chain.balance_of(candidate.token, holder).await?;

        if within_fraction(balance, total, self.max_fraction) {
            Ok(GateOutcome::Pass)
        } else {
            Ok(GateOutcome::fail(format!(
                "wallet holds {} of {} total supply",
                balance, total
            )))
        }
    }
}

/// `balance / total <= max_fraction`, computed in basis points without overflow
fn within_fraction(balance: U256, total: U256, max_fraction: f64) -> bool {
    let bps = (max_fraction.clamp(0.0, 1.0) * 10_000.0).round() as u64;
    balance.full_mul(U256::from(10_000u64)) <= total.full_mul(U256::from(bps))
}

/// Requires enough positive web search results for the token symbol
pub struct SentimentGate {
    chain: Arc<dyn ChainClient>,
    oracle: Arc<dyn Oracle>,
    keywords: Vec<String>,
    query_suffix: String,
    threshold: usize,
}

impl SentimentGate {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        oracle: Arc<dyn Oracle>,
        keywords: Vec<String>,
        query_suffix: String,
        threshold: usize,
    ) -> Self {
        Self {
            chain,
            oracle,
            keywords,
            query_suffix,
            threshold,
        }
    }
}

#[async_trait]
impl Gate for SentimentGate {
    fn kind(&self) -> GateKind {
        GateKind::Sentiment
    }

    async fn check(&self, candidate: &CandidateToken, _settings: &TradingSettings) -> Result<GateOutcome> {
        let symbol = match self.chain.token_symbol(candidate.token).await {
            Ok(symbol) => Some(symbol),
            Err(e) => {
                debug!(token = ?candidate.token, error = %e, "symbol() failed, searching by address");
                None
            }
        };

        let query = sentiment::search_query(symbol.as_deref(), candidate.token, &self.query_suffix);
        let hits = self.oracle.sentiment(&query).await?;
        let positives = sentiment::count_positive(&hits, &self.keywords);

        debug!(token = ?candidate.token, %query, positives, results = hits.len(), "Sentiment scored");

        if positives >= self.threshold {
            Ok(GateOutcome::Pass)
        } else {
            Ok(GateOutcome::fail(format!(
                "{} positive results, need {}",
                positives, self.threshold
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulationError;
    use crate::oracle::{SearchHit, Verification};
    use crate::testing::{candidate, settings, FakeChain, FakeOracle, TOKEN, WETH};

    #[test]
    fn test_within_fraction() {
        let total = U256::from(1_000u64);
        assert!(within_fraction(U256::zero(), total, 0.1));
        assert!(within_fraction(U256::from(100u64), total, 0.1));
        assert!(!within_fraction(U256::from(101u64), total, 0.1));
        assert!(within_fraction(U256::MAX, U256::MAX, 1.0));
    }

    #[test]
    fn test_gate_names() {
        assert_eq!(GateKind::SupplyConcentration.to_string(), "supply_concentration");
        assert_eq!(GateKind::SourceVerified.as_str(), "source_verified");
    }

    #[tokio::test]
    async fn test_ownership_gate() {
        let chain = Arc::new(FakeChain::new());
        let gate = OwnershipGate::new(chain.clone());

        chain.set_owner(Address::zero());
        assert_eq!(
            gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap(),
            GateOutcome::Pass
        );

        chain.set_owner(Address::from_low_u64_be(0xdead));
        assert!(matches!(
            gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap(),
            GateOutcome::Fail(_)
        ));
    }

    #[tokio::test]
    async fn test_supply_gate_rejects_zero_supply() {
        let chain = Arc::new(FakeChain::new());
        chain.set_supply(U256::zero(), U256::zero());
        let gate = SupplyGate::new(chain, 0.1);

        let outcome = gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap();
        assert_eq!(outcome, GateOutcome::fail("total supply is zero"));
    }

    #[tokio::test]
    async fn test_supply_gate_threshold() {
        let chain = Arc::new(FakeChain::new());
        let gate = SupplyGate::new(chain.clone(), 0.1);

        chain.set_supply(U256::from(1_000u64), U256::from(100u64));
        assert_eq!(
            gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap(),
            GateOutcome::Pass
        );

        chain.set_supply(U256::from(1_000u64), U256::from(250u64));
        assert!(matches!(
            gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap(),
            GateOutcome::Fail(_)
        ));
    }

    #[tokio::test]
    async fn test_verification_gate() {
        let oracle = Arc::new(FakeOracle::new());
        let gate = VerificationGate::new(oracle.clone());

        oracle.set_verification(Verification {
            verified: true,
            contract_name: Some("Token".into()),
        });
        assert_eq!(
            gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap(),
            GateOutcome::Pass
        );

        oracle.set_verification(Verification::default());
        assert!(matches!(
            gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap(),
            GateOutcome::Fail(_)
        ));
    }

    #[tokio::test]
    async fn test_sentiment_gate_uses_symbol_query() {
        let chain = Arc::new(FakeChain::new());
        chain.set_symbol(Some("PEPE".into()));
        let oracle = Arc::new(FakeOracle::new());
        oracle.set_hits(vec![
            SearchHit {
                title: "PEPE moon".into(),
                snippet: String::new(),
            },
            SearchHit {
                title: "bull run".into(),
                snippet: String::new(),
            },
        ]);

        let gate = SentimentGate::new(
            chain,
            oracle.clone(),
            vec!["moon".into(), "bull".into()],
            "memecoin".into(),
            2,
        );

        let outcome = gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap();
        assert_eq!(outcome, GateOutcome::Pass);
        assert_eq!(oracle.queries(), vec!["PEPE memecoin".to_string()]);
    }

    #[tokio::test]
    async fn test_sentiment_gate_falls_back_to_address() {
        let chain = Arc::new(FakeChain::new());
        chain.set_symbol(None);
        let oracle = Arc::new(FakeOracle::new());

        let gate = SentimentGate::new(chain, oracle.clone(), vec!["moon".into()], "memecoin".into(), 2);

        let outcome = gate.check(&candidate(), &settings(0.01, 0.1)).await.unwrap();
        assert!(matches!(outcome, GateOutcome::Fail(_)));
        assert_eq!(oracle.queries(), vec![format!("{:?} memecoin", TOKEN)]);
    }

    #[tokio::test]
    async fn test_honeypot_gate_policy() {
        let chain = Arc::new(FakeChain::new());
        let reject = HoneypotGate::new(
            HoneypotSimulator::new(chain.clone(), WETH, 3000, 120),
            AmbiguousRevertPolicy::Reject,
        );
        let accept = HoneypotGate::new(
            HoneypotSimulator::new(chain.clone(), WETH, 3000, 120),
            AmbiguousRevertPolicy::Accept,
        );

        chain.push_simulation(Ok(U256::from(10u64)));
        chain.push_simulation(Err(SimulationError::MissingRevertData("no data".into())));
        assert!(matches!(
            reject.check(&candidate(), &settings(0.01, 0.1)).await.unwrap(),
            GateOutcome::Fail(_)
        ));

        chain.push_simulation(Ok(U256::from(10u64)));
        chain.push_simulation(Err(SimulationError::MissingRevertData("no data".into())));
        assert_eq!(
            accept.check(&candidate(), &settings(0.01, 0.1)).await.unwrap(),
            GateOutcome::Pass
        );
    }
}
