use async_trait::async_trait;

use crate::Result;

/// Destination for rendered reports.
///
/// `TelegramNotifier` implements this for the bot; tests use a recording stub.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send an HTML-formatted message. Empty messages are not sent.
    async fn send_html(&self, chat_id: i64, message: &str) -> Result<()>;
}
