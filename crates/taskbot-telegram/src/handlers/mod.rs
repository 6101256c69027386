//! Telegram update handlers.
//!
//! Each handler converts the teloxide update into a core update and hands it
//! to [`TaskBotService`](taskbot_core::service::TaskBotService). Failures are
//! logged; returning an error to the dispatcher would only log it again.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use taskbot_core::messaging::types::IncomingUpdate;

use crate::{convert, router::AppState};

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let query = convert::callback_query(&q);
    let user = query.from.user_id;
    if let Err(e) = state.service.handle(IncomingUpdate::Callback(query)).await {
        tracing::error!(%user, "callback handling failed: {e}");
    }
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(update) = convert::incoming_update(&msg) else {
        tracing::debug!(chat = msg.chat.id.0, "ignoring message without a user sender or command name");
        return Ok(());
    };
    if let Err(e) = state.service.handle(update).await {
        tracing::error!(chat = msg.chat.id.0, "message handling failed: {e}");
    }
    Ok(())
}
