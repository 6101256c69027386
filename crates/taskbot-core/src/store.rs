//! JSON-file task storage.
//!
//! Two files, each a map of user id (decimal string) to that user's tasks:
//! the active list and the archive. Every mutation is written through
//! immediately with an atomic temp-file + rename.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    domain::{TaskId, UserId},
    errors::Error,
    task::{now_local, Task, TaskStats},
    Result,
};

type TaskMap = BTreeMap<String, Vec<Task>>;

#[derive(Debug)]
pub struct TaskStore {
    tasks_path: PathBuf,
    archive_path: PathBuf,
    tasks: TaskMap,
    archived: TaskMap,
}

impl TaskStore {
    /// Load both files. Missing or unreadable files start empty.
    pub fn open(tasks_path: impl Into<PathBuf>, archive_path: impl Into<PathBuf>) -> Self {
        let tasks_path = tasks_path.into();
        let archive_path = archive_path.into();
        let tasks = load_map(&tasks_path);
        let archived = load_map(&archive_path);
        tracing::info!(
            users = tasks.len(),
            archived_users = archived.len(),
            "loaded tasks from {}",
            tasks_path.display()
        );
        Self {
            tasks_path,
            archive_path,
            tasks,
            archived,
        }
    }

    pub fn user_tasks(&self, user: UserId) -> &[Task] {
        self.tasks
            .get(&user.storage_key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn archived_tasks(&self, user: UserId) -> &[Task] {
        self.archived
            .get(&user.storage_key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn archived_task(&self, user: UserId, id: TaskId) -> Option<&Task> {
        self.archived_tasks(user).iter().find(|t| t.id == id)
    }

    pub fn stats(&self, user: UserId) -> TaskStats {
        TaskStats::from_tasks(self.user_tasks(user))
    }

    /// Ids are unique per user across the active list and the archive.
    fn next_id(&self, user: UserId) -> TaskId {
        self.user_tasks(user)
            .iter()
            .chain(self.archived_tasks(user))
            .map(|t| t.id)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn add_task(
        &mut self,
        user: UserId,
        text: impl Into<String>,
        message_link: Option<String>,
    ) -> Result<Task> {
        let task = Task::new(self.next_id(user), text, message_link);
        let mut next = self.tasks.clone();
        next.entry(user.storage_key()).or_default().push(task.clone());
        self.commit_tasks(next)?;
        tracing::debug!(user = %user, id = task.id, "task added");
        Ok(task)
    }

    pub fn complete_task(&mut self, user: UserId, id: TaskId) -> Result<bool> {
        let mut next = self.tasks.clone();
        let Some(task) = next
            .get_mut(&user.storage_key())
            .and_then(|ts| ts.iter_mut().find(|t| t.id == id))
        else {
            return Ok(false);
        };
        task.complete(now_local());
        self.commit_tasks(next)?;
        Ok(true)
    }

    pub fn delete_task(&mut self, user: UserId, id: TaskId) -> Result<bool> {
        let mut next = self.tasks.clone();
        if take_task(&mut next, user, id).is_none() {
            return Ok(false);
        }
        self.commit_tasks(next)?;
        Ok(true)
    }

    /// Move a completed task into the archive. Pending tasks stay put.
    ///
    /// The archive is written first so a failure never leaves the task in
    /// neither file.
    pub fn archive_task(&mut self, user: UserId, id: TaskId) -> Result<bool> {
        let mut next_active = self.tasks.clone();
        let Some(mut task) = take_task_if(&mut next_active, user, id, Task::is_completed) else {
            return Ok(false);
        };
        task.archived_at = Some(now_local());
        let mut next_archived = self.archived.clone();
        next_archived
            .entry(user.storage_key())
            .or_default()
            .push(task);

        save_map(&self.archive_path, &next_archived)?;
        if let Err(e) = save_map(&self.tasks_path, &next_active) {
            // Put the archive file back so the task lives only in the active list.
            if let Err(undo) = save_map(&self.archive_path, &self.archived) {
                tracing::error!(
                    user = %user,
                    id,
                    "archive rollback failed, task is in both files: {undo}"
                );
            }
            return Err(e);
        }

        self.tasks = next_active;
        self.archived = next_archived;
        Ok(true)
    }

    pub fn permanently_delete_archived_task(&mut self, user: UserId, id: TaskId) -> Result<bool> {
        let mut next = self.archived.clone();
        if take_task(&mut next, user, id).is_none() {
            return Ok(false);
        }
        save_map(&self.archive_path, &next)?;
        self.archived = next;
        Ok(true)
    }

    /// Persist `next` as the active list, adopting it only once it is on disk.
    fn commit_tasks(&mut self, next: TaskMap) -> Result<()> {
        save_map(&self.tasks_path, &next)?;
        self.tasks = next;
        Ok(())
    }
}

fn take_task(map: &mut TaskMap, user: UserId, id: TaskId) -> Option<Task> {
    take_task_if(map, user, id, |_| true)
}

fn take_task_if(
    map: &mut TaskMap,
    user: UserId,
    id: TaskId,
    pred: impl Fn(&Task) -> bool,
) -> Option<Task> {
    let tasks = map.get_mut(&user.storage_key())?;
    let idx = tasks.iter().position(|t| t.id == id && pred(t))?;
    Some(tasks.remove(idx))
}

fn load_map(path: &Path) -> TaskMap {
    let txt = match fs::read_to_string(path) {
        Ok(txt) => txt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return TaskMap::new(),
        Err(e) => {
            tracing::warn!("failed to read {}: {e}; starting empty", path.display());
            return TaskMap::new();
        }
    };
    match serde_json::from_str::<TaskMap>(&txt) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!("corrupt task file {}: {e}; starting empty", path.display());
            TaskMap::new()
        }
    }
}

fn save_map(path: &Path, map: &TaskMap) -> Result<()> {
    let persist_err = |reason: String| Error::Persist {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
    }

    let mut txt = serde_json::to_string_pretty(map)?;
    txt.push('\n');

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, txt).map_err(|e| persist_err(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| persist_err(e.to_string()))?;
    Ok(())
}
