use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, warn};

use common::{Error, Notifier, Result};

/// Sends HTML messages through the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_html(&self, chat_id: i64, message: &str) -> Result<()> {
        if message.is_empty() {
            debug!(chat_id, "Nothing to send");
            return Ok(());
        }

        self.bot
            .send_message(ChatId(chat_id), message)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| {
                warn!(chat_id, error = %e, "Failed to send Telegram message");
                Error::Notify(e.to_string())
            })?;
        Ok(())
    }
}
