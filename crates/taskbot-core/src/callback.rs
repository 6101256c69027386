//! Inline-button callback payloads.
//!
//! Wire format is kept stable so buttons on messages sent by earlier
//! versions of the bot keep working after an upgrade.

use std::fmt;

use crate::domain::TaskId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Complete(TaskId),
    Delete(TaskId),
    Archive(TaskId),
    PermanentDelete(TaskId),
    AddForwarded,
    AddRegular,
    AddMedia,
    Cancel,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "add_forwarded_task" => return Some(Self::AddForwarded),
            "add_regular_task" => return Some(Self::AddRegular),
            "add_media_task" => return Some(Self::AddMedia),
            "cancel" => return Some(Self::Cancel),
            _ => {}
        }

        let prefixed: [(&str, fn(TaskId) -> Self); 4] = [
            ("perm_delete_", Self::PermanentDelete),
            ("complete_", Self::Complete),
            ("delete_", Self::Delete),
            ("archive_", Self::Archive),
        ];
        prefixed.iter().find_map(|(prefix, ctor)| {
            let id = data.strip_prefix(prefix)?.parse::<TaskId>().ok()?;
            Some(ctor(id))
        })
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete(id) => write!(f, "complete_{id}"),
            Self::Delete(id) => write!(f, "delete_{id}"),
            Self::Archive(id) => write!(f, "archive_{id}"),
            Self::PermanentDelete(id) => write!(f, "perm_delete_{id}"),
            Self::AddForwarded => f.write_str("add_forwarded_task"),
            Self::AddRegular => f.write_str("add_regular_task"),
            Self::AddMedia => f.write_str("add_media_task"),
            Self::Cancel => f.write_str("cancel"),
        }
    }
}
