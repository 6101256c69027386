//! teloxide types -> core types.

use teloxide::types::{ForwardedFrom, Message};

use taskbot_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    extract::{Attachment, Forward, ForwardOrigin, MessageSnapshot},
    messaging::types::{CallbackQuery, Command, IncomingMessage, IncomingUpdate, Sender},
};

/// Classify a message as a command or task material. `None` for messages
/// without a user sender (channel posts, service messages from chats) and
/// for slash text that names no command.
pub fn incoming_update(msg: &Message) -> Option<IncomingUpdate> {
    let user = msg.from()?;
    let from = Sender {
        chat_id: ChatId(msg.chat.id.0),
        user_id: UserId(user.id.0 as i64),
        username: user.username.clone(),
    };
    let snapshot = snapshot(msg);

    // A forwarded "/something" is content, not a command. Own slash text
    // without a command name ("/", "/@bot") is dropped.
    if !snapshot.is_forwarded() {
        if let Some(text) = snapshot.text.as_deref().filter(|t| t.starts_with('/')) {
            return Command::parse(from, text).map(IncomingUpdate::Command);
        }
    }

    Some(IncomingUpdate::Message(IncomingMessage { from, snapshot }))
}

pub fn snapshot(msg: &Message) -> MessageSnapshot {
    MessageSnapshot {
        forward: msg.forward().map(|f| Forward {
            origin: forward_origin(&f.from, f.message_id),
            date: Some(f.date),
        }),
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
        attachment: attachment(msg),
    }
}

fn forward_origin(from: &ForwardedFrom, message_id: Option<i32>) -> ForwardOrigin {
    match from {
        ForwardedFrom::User(user) => ForwardOrigin::User {
            first_name: user.first_name.clone(),
        },
        ForwardedFrom::SenderName(name) => ForwardOrigin::HiddenUser {
            sender_name: name.clone(),
        },
        ForwardedFrom::Chat(chat) => ForwardOrigin::Chat {
            title: chat.title().map(str::to_string),
            first_name: chat.first_name().map(str::to_string),
            username: chat.username().map(str::to_string),
            message_id,
        },
    }
}

fn attachment(msg: &Message) -> Option<Attachment> {
    if msg.photo().is_some() {
        return Some(Attachment::Photo);
    }
    if let Some(doc) = msg.document() {
        return Some(Attachment::Document {
            file_name: doc.file_name.clone(),
        });
    }
    if msg.video().is_some() {
        return Some(Attachment::Video);
    }
    if let Some(audio) = msg.audio() {
        return Some(Attachment::Audio {
            title: audio.title.clone(),
        });
    }
    if let Some(voice) = msg.voice() {
        return Some(Attachment::Voice {
            duration_secs: voice.duration,
        });
    }
    if msg.video_note().is_some() {
        return Some(Attachment::VideoNote);
    }
    if let Some(sticker) = msg.sticker() {
        return Some(Attachment::Sticker {
            emoji: sticker.emoji.clone(),
        });
    }
    if let Some(loc) = msg.location() {
        return Some(Attachment::Location {
            latitude: loc.latitude,
            longitude: loc.longitude,
        });
    }
    if let Some(contact) = msg.contact() {
        return Some(Attachment::Contact {
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            phone_number: contact.phone_number.clone(),
        });
    }
    msg.poll().map(|poll| Attachment::Poll {
        question: poll.question.clone(),
    })
}

pub fn callback_query(q: &teloxide::types::CallbackQuery) -> CallbackQuery {
    let message = q.message.as_ref().map(|m| MessageRef {
        chat_id: ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
    });
    // Private chat ids equal the user id; used when the message is gone.
    let chat_id = message
        .map(|m| m.chat_id)
        .unwrap_or(ChatId(q.from.id.0 as i64));

    CallbackQuery {
        from: Sender {
            chat_id,
            user_id: UserId(q.from.id.0 as i64),
            username: q.from.username.clone(),
        },
        callback_id: q.id.clone(),
        data: q.data.clone().unwrap_or_default(),
        message,
    }
}
