use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{InlineKeyboard, MessagingCapabilities},
    Result,
};

/// Outbound messenger port.
///
/// All text is Telegram-flavoured HTML; adapters without HTML support are
/// expected to strip tags.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    /// Replace the text of a sent message. Any inline keyboard is removed.
    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
