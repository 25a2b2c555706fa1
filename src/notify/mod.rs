//! Trade notifications
//!
//! Delivery is best effort: the executor logs a failed delivery and moves on.

pub mod telegram;

use async_trait::async_trait;
use ethers::types::{Address, TxHash};
use tracing::info;

use crate::error::Result;

pub use telegram::TelegramNotifier;

/// Message sent to every configured notifier after a trade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// "Trade Executed" message with an explorer link for `tx_hash`
    pub fn trade_executed(token: Address, tx_hash: TxHash, explorer_tx_url: &str) -> Self {
        Self {
            subject: format!("Trade Executed: {:?}", token),
            body: format!("Transaction: {}{:?}", explorer_tx_url, tx_hash),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the tracing log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        info!(subject = %notification.subject, "{}", notification.body);
        Ok(())
    }
}
