//! Task records as stored in `tasks.json` / `archived_tasks.json`.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::TaskId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }
}

/// One task of one user.
///
/// Timestamps are local wall-clock time without offset, which keeps files
/// written by earlier versions of the bot loadable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub status: TaskStatus,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub message_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<NaiveDateTime>,
}

impl Task {
    pub fn new(id: TaskId, text: impl Into<String>, message_link: Option<String>) -> Self {
        Self {
            id,
            text: text.into(),
            status: TaskStatus::Pending,
            created_at: now_local(),
            completed_at: None,
            message_link,
            archived_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Mark completed. The first completion time wins.
    pub fn complete(&mut self, at: NaiveDateTime) {
        self.status = TaskStatus::Completed;
        if self.completed_at.is_none() {
            self.completed_at = Some(at);
        }
    }
}

/// Per-user counters shown by `/stats`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Percentage in `0.0..=100.0`.
    pub completion_rate: f64,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.is_completed()).count();
        let completion_rate = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total,
            completed,
            pending: total - completed,
            completion_rate,
        }
    }
}

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}
