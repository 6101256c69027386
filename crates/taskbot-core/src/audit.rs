//! Append-only audit trail of user actions.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{domain::UserId, errors::Error, Result};

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,
    pub user_id: i64,
    pub username: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
}

impl AuditEvent {
    fn base(event: &str, user_id: UserId, username: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event: event.to_string(),
            user_id: user_id.0,
            username: username.to_string(),
            kind: None,
            content: None,
            task_id: None,
            ok: None,
            error: None,
            retry_after: None,
        }
    }

    /// Incoming command or message (`kind` = command name, `TEXT`, `MEDIA`, `FORWARD`).
    pub fn message(user_id: UserId, username: &str, kind: &str, content: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
            content: Some(content.to_string()),
            ..Self::base("message", user_id, username)
        }
    }

    /// A task mutation (`add`, `complete`, `delete`, `archive`, `purge`).
    pub fn task(user_id: UserId, username: &str, action: &str, task_id: u32, ok: bool) -> Self {
        Self {
            kind: Some(action.to_string()),
            task_id: Some(task_id),
            ok: Some(ok),
            ..Self::base("task", user_id, username)
        }
    }

    pub fn auth(user_id: UserId, username: &str, authorized: bool) -> Self {
        Self {
            ok: Some(authorized),
            ..Self::base("auth", user_id, username)
        }
    }

    pub fn rate_limit(user_id: UserId, username: &str, retry_after: f64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::base("rate_limit", user_id, username)
        }
    }

    pub fn error(user_id: UserId, username: &str, error: &str, context: Option<&str>) -> Self {
        Self {
            kind: context.map(|s| s.to_string()),
            error: Some(error.to_string()),
            ..Self::base("error", user_id, username)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: Option<PathBuf>,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: Option<PathBuf>, json: bool) -> Self {
        Self { path, json }
    }

    pub fn disabled() -> Self {
        Self::new(None, false)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Write and log failures instead of propagating them.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!("failed to write audit event: {e}");
        }
    }
}

/// Cut to `max_chars` characters, appending `...` when something was cut.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}
