use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the task bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub telegram_allowed_users: Vec<i64>,

    // Storage
    pub tasks_file: PathBuf,
    pub archived_tasks_file: PathBuf,

    // Telegram limits
    pub telegram_safe_limit: usize,

    // Audit
    pub audit_log_path: Option<PathBuf>,
    pub audit_log_json: bool,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = lookup("BOT_TOKEN")
            .and_then(non_empty)
            .or_else(|| lookup("TELEGRAM_BOT_TOKEN").and_then(non_empty))
            .ok_or_else(|| {
                Error::Config(
                    "BOT_TOKEN not found in environment variables. \
                     Please create a .env file with BOT_TOKEN=your_token_here"
                        .to_string(),
                )
            })?;

        // Empty list: the bot answers everyone.
        let telegram_allowed_users = parse_csv_i64(lookup("TELEGRAM_ALLOWED_USERS"));

        let tasks_file = PathBuf::from(
            lookup("TASKS_FILE")
                .and_then(non_empty)
                .unwrap_or_else(|| "tasks.json".to_string()),
        );
        let archived_tasks_file = PathBuf::from(
            lookup("ARCHIVED_TASKS_FILE")
                .and_then(non_empty)
                .unwrap_or_else(|| "archived_tasks.json".to_string()),
        );

        let telegram_safe_limit = parse_usize(lookup("TELEGRAM_SAFE_LIMIT"))
            .unwrap_or(4000)
            .clamp(200, 4096);

        let audit_log_path = lookup("AUDIT_LOG_PATH").and_then(non_empty).map(PathBuf::from);
        let audit_log_json = parse_bool(lookup("AUDIT_LOG_JSON")).unwrap_or(false);

        // Off unless asked for: the bot has always answered every request.
        let rate_limit_enabled = parse_bool(lookup("RATE_LIMIT_ENABLED")).unwrap_or(false);
        let rate_limit_requests = parse_u32(lookup("RATE_LIMIT_REQUESTS")).unwrap_or(30);
        if rate_limit_enabled && rate_limit_requests == 0 {
            return Err(Error::Config(
                "RATE_LIMIT_REQUESTS must be at least 1 when rate limiting is enabled".to_string(),
            ));
        }
        let rate_limit_window =
            Duration::from_secs(parse_u64(lookup("RATE_LIMIT_WINDOW")).unwrap_or(60));

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            tasks_file,
            archived_tasks_file,
            telegram_safe_limit,
            audit_log_path,
            audit_log_json,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_bool(v: Option<String>) -> Option<bool> {
    v.map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_u32(v: Option<String>) -> Option<u32> {
    v.and_then(|s| s.trim().parse::<u32>().ok())
}

fn parse_usize(v: Option<String>) -> Option<usize> {
    v.and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
