use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{Notifier, PriceAlert};
use crate::utils::error::AppError;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Delivers alerts through the Telegram Bot API. The subscriber reference
/// is the chat id.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_api_base(TELEGRAM_API, bot_token)
    }

    /// Point the notifier at a different API host (used by tests).
    pub fn with_api_base(api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            bot_token: bot_token.into(),
        }
    }

    fn format_message(&self, alert: &PriceAlert) -> String {
        let mut message = format!(
            "🚨 *Price Change Alert!*\n\n[{}]({})\n\n",
            alert.product_name, alert.url
        );

        match alert.previous_price {
            None => {
                message.push_str(&format!("Price: ${:.2}\n", alert.new_price));
                message.push_str("First observation for this product.");
            }
            Some(previous) => {
                message.push_str(&format!("Old Price: ${:.2}\n", previous));
                message.push_str(&format!("New Price: ${:.2}\n", alert.new_price));
                if alert.change_percent.is_finite() {
                    message.push_str(&format!("Change: {:+.2}%", alert.change_percent));
                } else {
                    message.push_str("Change: n/a (was unavailable)");
                }
            }
        }

        message
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, subscriber: &str, alert: &PriceAlert) -> Result<(), AppError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = json!({
            "chat_id": subscriber,
            "text": self.format_message(alert),
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Notification(format!(
                "Telegram API returned {} for chat {}",
                response.status(),
                subscriber
            )));
        }

        debug!("Sent Telegram alert to chat {}", subscriber);
        Ok(())
    }
}
