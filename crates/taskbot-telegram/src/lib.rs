//! Telegram adapter (teloxide).
//!
//! This crate implements the `taskbot-core` MessagingPort over Telegram Bot API
//! and converts incoming updates into core types.

use std::{future::IntoFuture, time::Duration};

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
};

use tokio::time::sleep;

pub mod convert;
pub mod handlers;
pub mod router;

use taskbot_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|b| InlineKeyboardButton::callback(b.label, b.callback_data))
                    .collect()
            })
            .collect();
        InlineKeyboardMarkup::new(rows)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    /// Run a request, honouring one `RetryAfter` from Telegram flood control.
    async fn with_retry<T, Fut>(&self, op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        retry_after_flood(op, |e: &teloxide::RequestError| match e {
            teloxide::RequestError::RetryAfter(d) => Some(*d),
            _ => None,
        })
        .await
        .map_err(Self::map_err)
    }
}

/// Retry `op` once when `retry_after` says the error asks for a pause.
async fn retry_after_flood<T, E, Fut>(
    mut op: impl FnMut() -> Fut,
    retry_after: impl Fn(&E) -> Option<Duration>,
) -> std::result::Result<T, E>
where
    Fut: IntoFuture<Output = std::result::Result<T, E>>,
{
    const MAX_RETRIES: usize = 1;
    let mut attempts = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => match retry_after(&e) {
                Some(d) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!("telegram flood control, retrying in {d:?}");
                    sleep(d).await;
                }
                _ => return Err(e),
            },
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: 4096,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let markup = Self::markup(keyboard);

        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true)
                    .reply_markup(markup.clone())
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        // Editing without reply_markup drops the inline keyboard.
        self.with_retry(|| {
            self.bot
                .edit_message_text(
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                    html.to_string(),
                )
                .parse_mode(ParseMode::Html)
                .disable_web_page_preview(true)
        })
        .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::{ready, Ready};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use taskbot_core::messaging::types::InlineButton;

    #[derive(Debug, PartialEq)]
    enum FakeError {
        Flood(u64),
        Fatal,
    }

    fn flood_wait(e: &FakeError) -> Option<Duration> {
        match e {
            FakeError::Flood(secs) => Some(Duration::from_secs(*secs)),
            FakeError::Fatal => None,
        }
    }

    fn scripted(
        calls: &AtomicUsize,
        script: Vec<std::result::Result<u8, FakeError>>,
    ) -> impl FnMut() -> Ready<std::result::Result<u8, FakeError>> + '_ {
        let mut script = script.into_iter();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(script.next().unwrap_or(Err(FakeError::Fatal)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn flood_error_is_retried_once_after_waiting() {
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();
        let out = retry_after_flood(
            scripted(&calls, vec![Err(FakeError::Flood(3)), Ok(7)]),
            flood_wait,
        )
        .await;
        assert_eq!(out, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn second_flood_error_is_returned() {
        let calls = AtomicUsize::new(0);
        let out = retry_after_flood(
            scripted(&calls, vec![Err(FakeError::Flood(1)), Err(FakeError::Flood(1))]),
            flood_wait,
        )
        .await;
        assert_eq!(out, Err(FakeError::Flood(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let out = retry_after_flood(scripted(&calls, vec![Err(FakeError::Fatal)]), flood_wait).await;
        assert_eq!(out, Err(FakeError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn keyboard_rows_are_preserved() {
        let kb = InlineKeyboard::new(vec![
            vec![
                InlineButton::new("✅ Complete #1", "complete_1"),
                InlineButton::new("🗑 Delete #1", "delete_1"),
            ],
            vec![InlineButton::new("✅ Complete #2", "complete_2")],
        ]);
        let markup = TelegramMessenger::markup(kb);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[0][1].text, "🗑 Delete #1");
        assert_eq!(markup.inline_keyboard[1].len(), 1);
    }
}
