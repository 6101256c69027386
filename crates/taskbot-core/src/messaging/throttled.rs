use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Spacing between any two API calls.
    pub global_min_interval: Duration,
    /// Spacing between calls targeting the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40),
            per_chat_min_interval: Duration::from_millis(1050),
        }
    }
}

/// Hands out evenly spaced time slots.
#[derive(Debug)]
struct SlotClock {
    interval: Duration,
    next_free: Instant,
}

impl SlotClock {
    fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_free: now,
        }
    }

    /// Claim the next slot at or after `now`; returns how long to wait for it.
    fn claim(&mut self, now: Instant) -> Duration {
        let slot = self.next_free.max(now);
        self.next_free = slot + self.interval;
        slot - now
    }
}

#[derive(Debug)]
struct Slots {
    global: SlotClock,
    chats: HashMap<ChatId, SlotClock>,
}

/// MessagingPort decorator that spaces out outbound calls.
///
/// Button presses on a long task list turn into bursts of edits; this keeps
/// them under Telegram's flood limits. 429s are still possible and are
/// retried by the adapter.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    slots: Mutex<Slots>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            slots: Mutex::new(Slots {
                global: SlotClock::new(cfg.global_min_interval, Instant::now()),
                chats: HashMap::new(),
            }),
        }
    }

    async fn wait_turn(&self, chat: Option<ChatId>) {
        let wait = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            let global = slots.global.claim(now);
            let per_chat = match chat {
                Some(chat) => slots
                    .chats
                    .entry(chat)
                    .or_insert_with(|| SlotClock::new(self.cfg.per_chat_min_interval, now))
                    .claim(now),
                None => Duration::ZERO,
            };
            global.max(per_chat)
        };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_html(chat_id, html).await
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_inline_keyboard(chat_id, html, keyboard).await
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.wait_turn(Some(msg.chat_id)).await;
        self.inner.edit_html(msg, html).await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        // Callback answers carry no chat id.
        self.wait_turn(None).await;
        self.inner.answer_callback_query(callback_id, text).await
    }
}
