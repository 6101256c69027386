//! User-facing texts. Everything returned here is Telegram HTML with user
//! content escaped.

use chrono::NaiveDateTime;

use crate::{
    callback::CallbackAction,
    domain::TaskId,
    formatting::{escape_html, preview},
    messaging::types::{InlineButton, InlineKeyboard},
    task::{Task, TaskStats},
};

const LONG_DATE: &str = "%Y-%m-%d %H:%M";
const SHORT_DATE: &str = "%m/%d";

/// Added-task confirmations for forwarded and media drafts show this many chars.
pub const ADDED_PREVIEW_CHARS: usize = 50;
/// Forwarded/media previews before confirmation show this many chars.
pub const DRAFT_PREVIEW_CHARS: usize = 100;

pub const CONFIRM_QUESTION: &str = "Do you want to add this as a task?";

pub fn welcome() -> String {
    "🤖 <b>Task Recording Bot</b>

Welcome! I can help you manage your tasks.

<b>Available commands:</b>
/add &lt;task&gt; - Add a new task
/list - Show all your tasks
/complete &lt;task_id&gt; - Mark task as completed
/delete &lt;task_id&gt; - Delete a task
/archive &lt;task_id&gt; - Archive a completed task
/archived - List all archived tasks
/archived &lt;task_id&gt; - View specific archived task
/stats - Show task statistics
/help - Show this help message

<b>Smart Features:</b>
📨 Forward any message to convert it to a task
📎 Send photos, documents, or media to create tasks
💬 Send regular text messages to create tasks

<b>Example:</b>
<code>/add Buy groceries</code>
<code>/complete 1</code>
<code>/archive 1</code>

<b>Forward Examples:</b>
- Forward a message from a colleague → Task with sender info
- Forward a photo with caption → Task with image description
- Forward a document → Task with file details"
        .to_string()
}

pub fn add_usage() -> String {
    "Please provide a task description.\nExample: <code>/add Buy groceries</code>".to_string()
}

pub fn task_id_usage(command: &str) -> String {
    format!("Please provide a task ID.\nExample: <code>/{command} 1</code>")
}

pub fn invalid_task_id() -> String {
    "Please provide a valid task ID number.".to_string()
}

pub fn task_added(task: &Task) -> String {
    format!(
        "✅ Task added successfully!\n<b>Task #{}:</b> {}\n<b>Status:</b> {}\n<b>Created:</b> {}",
        task.id,
        escape_html(&task.text),
        task.status.as_str(),
        task.created_at.format(LONG_DATE)
    )
}

/// Short confirmation used when a draft is turned into a task.
pub fn draft_added(task: &Task, truncate: bool) -> String {
    let text = if truncate {
        preview(&task.text, ADDED_PREVIEW_CHARS)
    } else {
        task.text.clone()
    };
    let mut out = format!(
        "✅ Task added successfully!\n<b>Task #{}:</b> {}",
        task.id,
        escape_html(&text)
    );
    if let Some(link) = &task.message_link {
        out.push_str("\n\n");
        out.push_str(&original_message_link(link));
    }
    out
}

pub fn no_tasks() -> String {
    "📝 You have no tasks yet. Use /add to create one!".to_string()
}

/// Task list body plus one keyboard row per task.
pub fn task_list(tasks: &[Task]) -> (String, InlineKeyboard) {
    let mut text = String::from("📋 <b>Your Tasks:</b>\n\n");
    let mut rows = Vec::with_capacity(tasks.len());

    for task in tasks {
        let status_emoji = if task.is_completed() { "✅" } else { "⏳" };
        text.push_str(&format!(
            "{status_emoji} <b>#{}</b> {}\n",
            task.id,
            escape_html(&task.text)
        ));
        if let Some(link) = &task.message_link {
            text.push_str(&format!("   {}\n", original_message_link(link)));
        }
        text.push_str(&format!("   📅 {}", task.created_at.format(SHORT_DATE)));
        if let (true, Some(done)) = (task.is_completed(), task.completed_at) {
            text.push_str(&format!(" → ✅ {}", done.format(SHORT_DATE)));
        }
        text.push_str("\n\n");

        let delete = InlineButton::new(
            format!("🗑 Delete #{}", task.id),
            CallbackAction::Delete(task.id),
        );
        let primary = if task.is_completed() {
            InlineButton::new(
                format!("📦 Archive #{}", task.id),
                CallbackAction::Archive(task.id),
            )
        } else {
            InlineButton::new(
                format!("✅ Complete #{}", task.id),
                CallbackAction::Complete(task.id),
            )
        };
        rows.push(vec![primary, delete]);
    }

    (text, InlineKeyboard::new(rows))
}

pub fn completed(id: TaskId) -> String {
    format!("✅ Task #{id} marked as completed!")
}

pub fn deleted(id: TaskId) -> String {
    format!("🗑 Task #{id} deleted successfully!")
}

pub fn archived(id: TaskId) -> String {
    format!("📦 Task #{id} archived successfully!")
}

pub fn permanently_deleted(id: TaskId) -> String {
    format!("🗑 Task #{id} permanently deleted!")
}

pub fn not_found(id: TaskId) -> String {
    format!("❌ Task #{id} not found.")
}

pub fn not_found_or_not_completed(id: TaskId) -> String {
    format!("❌ Task #{id} not found or not completed.")
}

pub fn archived_not_found(id: TaskId) -> String {
    format!("❌ Task #{id} not found in archived tasks.")
}

pub fn archived_detail_not_found(id: TaskId) -> String {
    format!("❌ Archived task #{id} not found.")
}

pub fn no_stats() -> String {
    "📊 No tasks to show statistics for.".to_string()
}

pub fn stats(stats: &TaskStats) -> String {
    format!(
        "📊 <b>Task Statistics</b>\n\n📝 Total tasks: {}\n✅ Completed: {}\n⏳ Pending: {}\n📈 Completion rate: {:.1}%",
        stats.total, stats.completed, stats.pending, stats.completion_rate
    )
}

pub fn no_archived_tasks() -> String {
    "📦 You have no archived tasks.".to_string()
}

pub fn archived_list(tasks: &[Task]) -> String {
    let mut text = String::from("📦 <b>Your Archived Tasks:</b>\n\n");
    for task in tasks {
        text.push_str(&format!(
            "✅ <b>#{}</b> {}\n",
            task.id,
            escape_html(&task.text)
        ));
        text.push_str(&format!(
            "   📅 Created: {} | Completed: {} | Archived: {}\n\n",
            task.created_at.format(SHORT_DATE),
            fmt_opt(task.completed_at, SHORT_DATE),
            fmt_opt(task.archived_at, SHORT_DATE),
        ));
    }
    text.push_str("\nUse /archived &lt;task_id&gt; to view details of a specific archived task.");
    text
}

pub fn archived_detail(task: &Task) -> (String, InlineKeyboard) {
    let text = format!(
        "📦 <b>Archived Task #{}</b>\n\n<b>Task:</b> {}\n<b>Status:</b> {}\n<b>Created:</b> {}\n<b>Completed:</b> {}\n<b>Archived:</b> {}",
        task.id,
        escape_html(&task.text),
        task.status.as_str(),
        task.created_at.format(LONG_DATE),
        fmt_opt(task.completed_at, LONG_DATE),
        fmt_opt(task.archived_at, LONG_DATE),
    );
    let keyboard = InlineKeyboard::single_row(vec![InlineButton::new(
        "🗑 Delete Permanently",
        CallbackAction::PermanentDelete(task.id),
    )]);
    (text, keyboard)
}

pub fn forwarded_preview(content: &str, link: Option<&str>) -> String {
    let link_text = link
        .map(|l| format!("\n\n{}", original_message_link(l)))
        .unwrap_or_default();
    format!(
        "📨 <b>Forwarded Message Detected</b>\n\n<b>Content Preview:</b>\n{}{link_text}\n\n{CONFIRM_QUESTION}",
        escape_html(&preview(content, DRAFT_PREVIEW_CHARS))
    )
}

pub fn forward_not_extractable() -> String {
    "❌ Could not extract task content from forwarded message.".to_string()
}

pub fn media_preview(content: &str) -> String {
    format!(
        "📎 <b>Media Message Detected</b>\n\n<b>Content:</b> {}\n\n{CONFIRM_QUESTION}",
        escape_html(&preview(content, DRAFT_PREVIEW_CHARS))
    )
}

pub fn media_not_extractable() -> String {
    "❌ Could not extract task content from this message.".to_string()
}

pub fn regular_prompt(text: &str) -> String {
    format!(
        "{CONFIRM_QUESTION}\n\n<b>\"{}\"</b>",
        escape_html(text)
    )
}

pub fn confirm_keyboard(add: CallbackAction) -> InlineKeyboard {
    InlineKeyboard::single_row(vec![
        InlineButton::new("✅ Add as Task", add),
        InlineButton::new("❌ Cancel", CallbackAction::Cancel),
    ])
}

pub fn draft_missing() -> String {
    "❌ Task content not found.".to_string()
}

pub fn creation_cancelled() -> String {
    "❌ Task creation cancelled.".to_string()
}

pub fn storage_failed() -> String {
    "❌ Could not save your tasks. Please try again later.".to_string()
}

pub fn unauthorized() -> String {
    "Unauthorized. Contact the bot owner for access.".to_string()
}

pub fn rate_limited(retry_after_secs: f64) -> String {
    format!("⏳ Rate limited. Please wait {retry_after_secs:.1} seconds.")
}

fn original_message_link(link: &str) -> String {
    format!("🔗 <a href=\"{}\">Original Message</a>", escape_html(link))
}

fn fmt_opt(ts: Option<NaiveDateTime>, fmt: &str) -> String {
    ts.map(|t| t.format(fmt).to_string())
        .unwrap_or_else(|| "N/A".to_string())
}
