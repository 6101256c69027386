use crate::{
    domain::{ChatId, MessageRef, UserId},
    extract::MessageSnapshot,
};

/// Who sent an update, and where to answer.
#[derive(Clone, Debug)]
pub struct Sender {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
}

impl Sender {
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("unknown")
    }
}

/// Messenger-neutral incoming update.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Command(Command),
    Message(IncomingMessage),
    Callback(CallbackQuery),
}

#[derive(Clone, Debug)]
pub struct Command {
    pub from: Sender,
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Parse `/cmd@botname arg1 arg2`. Returns `None` for non-commands.
    pub fn parse(from: Sender, text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let mut words = rest.split_whitespace();
        let name = words
            .next()?
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            from,
            name,
            args: words.map(str::to_string).collect(),
        })
    }

    /// Arguments joined back with single spaces.
    pub fn joined_args(&self) -> String {
        self.args.join(" ")
    }
}

#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub from: Sender,
    pub snapshot: MessageSnapshot,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub from: Sender,
    pub callback_id: String,
    pub data: String,
    pub message: Option<MessageRef>,
}

/// Inline keyboard laid out in rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl ToString) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.to_string(),
        }
    }
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    pub fn single_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.is_empty())
    }
}

/// Limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}
