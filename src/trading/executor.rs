//! Swap execution and position recording
//!
//! A trade is `exactInputSingle(base -> token)` with the configured amount as
//! native value and no minimum output. Only a confirmed, successful receipt
//! creates a position; anything before that leaves the ledger untouched.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, TxHash, U256};
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::chain::{deadline_from_now, eth_to_wei, ChainClient, SwapRequest};
use crate::config::{Config, TradingSettings};
use crate::error::{Error, Result};
use crate::notify::{Notification, Notifier};
use crate::oracle::Oracle;
use crate::position::{Ledger, Position};

/// Outcome of [`TradeExecutor::execute_trade`]
#[derive(Debug, Clone, PartialEq)]
pub struct TradeResult {
    pub success: bool,
    pub tx_hash: Option<TxHash>,
    pub position: Option<Position>,
    pub error: Option<String>,
    /// The swap may have reached the network, even if it was never confirmed
    pub broadcast: bool,
}

impl TradeResult {
    fn failed(error: &Error, tx_hash: Option<TxHash>) -> Self {
        Self {
            success: false,
            tx_hash,
            position: None,
            error: Some(error.to_string()),
            broadcast: tx_hash.is_some() || error.is_post_broadcast(),
        }
    }
}

pub struct TradeExecutor {
    chain: Arc<dyn ChainClient>,
    oracle: Arc<dyn Oracle>,
    ledger: Arc<Ledger>,
    notifiers: Vec<Arc<dyn Notifier>>,
    base_asset: Address,
    fee: u32,
    deadline_secs: u64,
    submission_timeout: Duration,
    confirmation_timeout: Duration,
    explorer_tx_url: String,
    dry_run: bool,
}

impl TradeExecutor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        oracle: Arc<dyn Oracle>,
        ledger: Arc<Ledger>,
        notifiers: Vec<Arc<dyn Notifier>>,
        base_asset: Address,
        config: &Config,
    ) -> Self {
        Self {
            chain,
            oracle,
            ledger,
            notifiers,
            base_asset,
            fee: config.trading.fee_tier,
            deadline_secs: config.trading.deadline_secs,
            submission_timeout: Duration::from_secs(config.trading.submission_timeout_secs),
            confirmation_timeout: Duration::from_secs(config.trading.confirmation_timeout_secs),
            explorer_tx_url: config.notifications.explorer_tx_url.clone(),
            dry_run: false,
        }
    }

    /// Log trades instead of submitting them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        if dry_run {
            info!("Executor in DRY RUN mode - swaps will be logged, not sent");
        }
        self
    }

    pub async fn execute_trade(&self, token: Address, settings: &TradingSettings) -> TradeResult {
        let amount_in = match eth_to_wei(settings.trade_amount_eth) {
            Ok(amount) => amount,
            Err(e) => return TradeResult::failed(&e, None),
        };

        let request = self.buy_request(token, amount_in);

        if self.dry_run {
            info!(
                token = ?token,
                amount_eth = settings.trade_amount_eth,
                fee = request.fee,
                "[DRY RUN] Would submit exactInputSingle"
            );
            return TradeResult::failed(&Error::Internal("dry run: swap not submitted".into()), None);
        }

        info!(token = ?token, amount_eth = settings.trade_amount_eth, "Submitting buy");

        let tx_hash = match self.submit(&request).await {
            Ok(hash) => hash,
            Err(e) => {
                error!(token = ?token, error = %e, "Swap submission failed");
                return TradeResult::failed(&e, None);
            }
        };

        if let Err(e) = self.confirm(tx_hash).await {
            if e.is_post_broadcast() {
                warn!(token = ?token, tx_hash = ?tx_hash, error = %e, "Trade not confirmed; transaction was broadcast");
            } else {
                error!(token = ?token, tx_hash = ?tx_hash, error = %e, "Trade failed");
            }
            return TradeResult::failed(&e, Some(tx_hash));
        }

        let price = self.entry_price(token).await;
        let position = Position::open(
            token,
            tx_hash,
            settings.trade_amount_eth,
            price * settings.trade_amount_eth,
        );

        info!(
            token = ?token,
            tx_hash = ?tx_hash,
            value_at_trade = position.value_at_trade,
            "Trade confirmed"
        );

        let mut result = TradeResult {
            success: true,
            tx_hash: Some(tx_hash),
            position: Some(position.clone()),
            error: None,
            broadcast: true,
        };

        if let Err(e) = self.ledger.append(position).await {
            error!(token = ?token, tx_hash = ?tx_hash, error = %e, "Confirmed trade could not be recorded");
            result.position = None;
            result.error = Some(e.to_string());
        }

        self.notify_all(&Notification::trade_executed(token, tx_hash, &self.explorer_tx_url))
            .await;

        result
    }

    fn buy_request(&self, token: Address, amount_in: U256) -> SwapRequest {
        SwapRequest {
            token_in: self.base_asset,
            token_out: token,
            fee: self.fee,
            recipient: self.chain.wallet_address(),
            deadline: deadline_from_now(self.deadline_secs),
            amount_in,
            amount_out_minimum: U256::zero(),
            value: amount_in,
        }
    }

    /// A submission that outlives the deadline may still have been broadcast
    async fn submit(&self, request: &SwapRequest) -> Result<TxHash> {
        tokio::time::timeout(self.submission_timeout, self.chain.submit_swap(request))
            .await
            .map_err(|_| Error::SubmissionTimeout(self.submission_timeout.as_secs()))?
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<()> {
        let receipt = tokio::time::timeout(self.confirmation_timeout, self.chain.wait_for_receipt(tx_hash))
            .await
            .map_err(|_| Error::ConfirmationTimeout(self.confirmation_timeout.as_secs()))??;

        if receipt.success {
            Ok(())
        } else {
            Err(Error::TransactionReverted(format!("{:?}", tx_hash)))
        }
    }

    /// Fiat price at entry; 0 when unavailable
    async fn entry_price(&self, token: Address) -> f64 {
        match self.oracle.price(token).await {
            Ok(Some(price)) if price.is_finite() => price,
            Ok(_) => {
                warn!(token = ?token, "No price for token, recording value_at_trade as 0");
                0.0
            }
            Err(e) => {
                warn!(token = ?token, error = %e, "Price lookup failed, recording value_at_trade as 0");
                0.0
            }
        }
    }

    async fn notify_all(&self, notification: &Notification) {
        let deliveries = self.notifiers.iter().map(|notifier| async move {
            if let Err(e) = notifier.notify(notification).await {
                warn!(notifier = notifier.name(), error = %e, "Notification delivery failed");
            }
        });
        join_all(deliveries).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SwapReceipt;
    use crate::position::PositionStatus;
    use crate::testing::{settings, FakeChain, FakeOracle, RecordingNotifier, TOKEN, WETH};
    use tempfile::tempdir;

    struct Harness {
        chain: Arc<FakeChain>,
        oracle: Arc<FakeOracle>,
        ledger: Arc<Ledger>,
        notifier: Arc<RecordingNotifier>,
        executor: TradeExecutor,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let chain = Arc::new(FakeChain::new());
        let oracle = Arc::new(FakeOracle::new());
        let ledger = Arc::new(Ledger::open(dir.path().join("tradeLog.json")).await.unwrap());
        let notifier = Arc::new(RecordingNotifier::new());

        let mut config = Config::default();
        config.trading.submission_timeout_secs = 1;
        config.trading.confirmation_timeout_secs = 1;

        let executor = TradeExecutor::new(
            chain.clone(),
            oracle.clone(),
            ledger.clone(),
            vec![notifier.clone()],
            WETH,
            &config,
        );

        Harness {
            chain,
            oracle,
            ledger,
            notifier,
            executor,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_successful_trade_appends_one_position() {
        let h = harness().await;
        h.oracle.set_price(TOKEN, Some(2_000.0));

        let result = h.executor.execute_trade(TOKEN, &settings(0.05, 0.1)).await;

        assert!(result.success, "{:?}", result.error);
        let positions = h.ledger.positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].token_address, TOKEN);
        assert_eq!(positions[0].amount_invested, 0.05);
        assert_eq!(positions[0].value_at_trade, 2_000.0 * 0.05);
        assert_eq!(positions[0].status, PositionStatus::Open);
        assert_eq!(result.position.as_ref(), Some(&positions[0]));

        let submitted = h.chain.submitted_requests();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].token_in, WETH);
        assert_eq!(submitted[0].token_out, TOKEN);
        assert_eq!(submitted[0].value, U256::exp10(16) * 5);
        assert!(submitted[0].amount_out_minimum.is_zero());

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains(&format!("{:?}", result.tx_hash.unwrap())));
    }

    #[tokio::test]
    async fn test_missing_price_records_zero_value() {
        let h = harness().await;
        h.oracle.set_price(TOKEN, None);

        let result = h.executor.execute_trade(TOKEN, &settings(0.01, 0.1)).await;

        assert!(result.success);
        assert_eq!(h.ledger.positions().await.unwrap()[0].value_at_trade, 0.0);
    }

    #[tokio::test]
    async fn test_submission_failure_appends_nothing() {
        let h = harness().await;
        h.chain.fail_submission("insufficient funds for gas * price + value");

        let result = h.executor.execute_trade(TOKEN, &settings(0.01, 0.1)).await;

        assert!(!result.success);
        assert!(result.tx_hash.is_none());
        assert!(!result.broadcast);
        assert!(h.ledger.positions().await.unwrap().is_empty());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_stuck_submission_times_out() {
        let h = harness().await;
        h.chain.hang_submissions();

        let result = h.executor.execute_trade(TOKEN, &settings(0.01, 0.1)).await;

        assert!(!result.success);
        assert!(result.broadcast);
        assert!(result.error.unwrap().contains("not acknowledged"));
        assert!(h.ledger.positions().await.unwrap().is_empty());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_failure() {
        let h = harness().await;
        h.chain.set_receipt(SwapReceipt {
            tx_hash: TxHash::zero(),
            block_number: Some(100),
            success: false,
            gas_used: None,
        });

        let result = h.executor.execute_trade(TOKEN, &settings(0.01, 0.1)).await;

        assert!(!result.success);
        assert!(result.tx_hash.is_some());
        assert!(result.error.unwrap().contains("reverted"));
        assert!(h.ledger.positions().await.unwrap().is_empty());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_timeout_is_failure() {
        let h = harness().await;
        h.chain.hang_receipts();

        let result = h.executor.execute_trade(TOKEN, &settings(0.01, 0.1)).await;

        assert!(!result.success);
        assert!(result.broadcast);
        assert!(result.error.unwrap().contains("not confirmed"));
        assert!(h.ledger.positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_roll_back() {
        let h = harness().await;
        h.notifier.fail_deliveries();

        let result = h.executor.execute_trade(TOKEN, &settings(0.01, 0.1)).await;

        assert!(result.success);
        assert_eq!(h.ledger.positions().await.unwrap().len(), 1);
        assert_eq!(h.notifier.attempts(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let mut h = harness().await;
        h.executor = h.executor.with_dry_run(true);

        let result = h.executor.execute_trade(TOKEN, &settings(0.01, 0.1)).await;

        assert!(!result.success);
        assert!(h.chain.submitted_requests().is_empty());
        assert!(h.ledger.positions().await.unwrap().is_empty());
    }
}
