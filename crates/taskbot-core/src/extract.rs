//! Turning an incoming message (forwarded, media, or plain) into task text.
//!
//! The Telegram adapter converts its native message type into
//! [`MessageSnapshot`]; everything here is framework-free.

use chrono::{DateTime, Utc};

/// Where a forwarded message originally came from.
#[derive(Clone, Debug, PartialEq)]
pub enum ForwardOrigin {
    /// A user with a visible profile.
    User { first_name: String },
    /// A user who hides their account in forwards; only the name is known.
    HiddenUser { sender_name: String },
    /// A channel or group post.
    Chat {
        title: Option<String>,
        first_name: Option<String>,
        username: Option<String>,
        message_id: Option<i32>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Forward {
    pub origin: ForwardOrigin,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Attachment {
    Photo,
    Document {
        file_name: Option<String>,
    },
    Video,
    Audio {
        title: Option<String>,
    },
    Voice {
        duration_secs: u32,
    },
    VideoNote,
    Sticker {
        emoji: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
    Contact {
        first_name: String,
        last_name: Option<String>,
        phone_number: String,
    },
    Poll {
        question: String,
    },
}

impl Attachment {
    pub fn describe(&self) -> String {
        match self {
            Attachment::Photo => "📷 Photo attached".to_string(),
            Attachment::Document { file_name } => format!(
                "📎 Document: {}",
                file_name.as_deref().unwrap_or("Unknown file")
            ),
            Attachment::Video => "🎥 Video attached".to_string(),
            Attachment::Audio { title } => {
                format!("🎵 Audio: {}", title.as_deref().unwrap_or("Unknown audio"))
            }
            Attachment::Voice { duration_secs } => {
                format!("🎤 Voice message ({duration_secs}s)")
            }
            Attachment::VideoNote => "🎬 Video note attached".to_string(),
            Attachment::Sticker { emoji } => {
                format!("🎭 Sticker: {}", emoji.as_deref().unwrap_or("N/A"))
            }
            Attachment::Location {
                latitude,
                longitude,
            } => format!("📍 Location: {latitude:.4}, {longitude:.4}"),
            Attachment::Contact {
                first_name,
                last_name,
                phone_number,
            } => {
                let name = format!("{first_name} {}", last_name.as_deref().unwrap_or(""));
                format!("👤 Contact: {} ({phone_number})", name.trim())
            }
            Attachment::Poll { question } => format!("📊 Poll: {question}"),
        }
    }
}

/// The parts of an incoming message that matter for task creation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageSnapshot {
    pub forward: Option<Forward>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub attachment: Option<Attachment>,
}

impl MessageSnapshot {
    pub fn is_forwarded(&self) -> bool {
        self.forward.is_some()
    }

    pub fn has_media(&self) -> bool {
        self.attachment.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedTask {
    pub content: Option<String>,
    /// Public link to the original post, when it can be built.
    pub link: Option<String>,
}

const PART_SEPARATOR: &str = " | ";

pub fn extract_task(msg: &MessageSnapshot) -> ExtractedTask {
    let mut parts: Vec<String> = Vec::new();
    let mut link = None;

    if let Some(fwd) = &msg.forward {
        let from = match &fwd.origin {
            ForwardOrigin::User { first_name } => first_name.clone(),
            ForwardOrigin::HiddenUser { sender_name } => sender_name.clone(),
            ForwardOrigin::Chat {
                title,
                first_name,
                username,
                message_id,
            } => {
                if let (Some(username), Some(message_id)) = (username, message_id) {
                    link = Some(public_message_link(username, *message_id));
                }
                title
                    .clone()
                    .or_else(|| first_name.clone())
                    .unwrap_or_else(|| "Unknown".to_string())
            }
        };
        parts.push(format!("From: {from}"));

        if let Some(date) = fwd.date {
            parts.push(format!("Date: {}", date.format("%Y-%m-%d %H:%M")));
        }
    }

    if let Some(text) = msg.text.as_deref().filter(|t| !t.is_empty()) {
        parts.push(format!("Text: {text}"));
    } else if let Some(caption) = msg.caption.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("Caption: {caption}"));
    }

    if let Some(att) = &msg.attachment {
        parts.push(att.describe());
    }

    let content = if parts.is_empty() {
        None
    } else {
        Some(parts.join(PART_SEPARATOR))
    };

    ExtractedTask { content, link }
}

pub fn public_message_link(username: &str, message_id: i32) -> String {
    format!(
        "https://t.me/{}/{message_id}",
        username.trim_start_matches('@')
    )
}
