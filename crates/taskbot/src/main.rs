use std::sync::Arc;

use taskbot_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), taskbot_core::Error> {
    taskbot_core::logging::init("taskbot")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        tasks_file = %cfg.tasks_file.display(),
        archived_tasks_file = %cfg.archived_tasks_file.display(),
        allowed_users = cfg.telegram_allowed_users.len(),
        "starting task bot"
    );

    taskbot_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| taskbot_core::Error::External(format!("telegram bot failed: {e:#}")))?;

    Ok(())
}
