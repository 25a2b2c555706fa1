//! Telegram Bot API notifier

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{Notification, Notifier};
use crate::error::{Error, Result};

const TELEGRAM_API: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: TELEGRAM_API.to_string(),
            bot_token,
            chat_id,
        })
    }

    fn message_text(notification: &Notification) -> String {
        format!("{}\n{}", notification.subject, notification.body)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: Self::message_text(notification),
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            // reqwest errors carry the URL, which contains the bot token
            .map_err(|e| Error::Notification(format!("Telegram request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!("Telegram API error {}: {}", status, body)));
        }

        debug!(chat_id = %self.chat_id, "Telegram notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text() {
        let n = Notification {
            subject: "Trade Executed: 0xabc".into(),
            body: "Transaction: https://etherscan.io/tx/0x1".into(),
        };
        assert_eq!(
            TelegramNotifier::message_text(&n),
            "Trade Executed: 0xabc\nTransaction: https://etherscan.io/tx/0x1"
        );
    }
}
