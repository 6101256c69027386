use std::sync::Arc;

use anyhow::Context;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use taskbot_core::{
    audit::AuditLogger,
    config::Config,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    service::TaskBotService,
    store::TaskStore,
};

use crate::handlers;
use crate::TelegramMessenger;

pub struct AppState {
    pub service: TaskBotService,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot
        .get_me()
        .await
        .context("getMe failed; check BOT_TOKEN and network access")?;
    tracing::info!("task bot started: @{}", me.username());
    if cfg.telegram_allowed_users.is_empty() {
        tracing::warn!("TELEGRAM_ALLOWED_USERS is empty; the bot answers everyone");
    }

    // Button presses on a long list can burst into edits; keep them under flood limits.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let store = TaskStore::open(cfg.tasks_file.clone(), cfg.archived_tasks_file.clone());
    let audit = AuditLogger::new(cfg.audit_log_path.clone(), cfg.audit_log_json);
    if let Some(path) = audit.path() {
        tracing::info!("audit log: {}", path.display());
    }

    let state = Arc::new(AppState {
        service: TaskBotService::new(cfg, store, messenger, audit),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("task bot stopped");
    Ok(())
}
