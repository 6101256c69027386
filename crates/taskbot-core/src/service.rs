//! Messenger-agnostic bot logic: commands, draft confirmation, and buttons.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    audit::{AuditEvent, AuditLogger},
    callback::CallbackAction,
    config::Config,
    domain::{parse_task_id, ChatId, TaskId},
    drafts::{ForwardedDraft, PendingDrafts},
    extract::extract_task,
    formatting::split_html_chunks,
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, Command, IncomingMessage, IncomingUpdate, InlineKeyboard, Sender},
    },
    render,
    security::{is_authorized, RateLimiter},
    store::TaskStore,
    task::Task,
    Result,
};

/// How a task id argument resolved.
enum IdArg {
    Missing,
    Invalid,
    Valid(TaskId),
}

fn id_arg(cmd: &Command) -> IdArg {
    match cmd.args.first() {
        None => IdArg::Missing,
        Some(raw) => parse_task_id(raw).map_or(IdArg::Invalid, IdArg::Valid),
    }
}

pub struct TaskBotService {
    cfg: Arc<Config>,
    store: Mutex<TaskStore>,
    drafts: Mutex<PendingDrafts>,
    rate_limiter: Mutex<RateLimiter>,
    messenger: Arc<dyn MessagingPort>,
    audit: AuditLogger,
}

impl TaskBotService {
    pub fn new(
        cfg: Arc<Config>,
        store: TaskStore,
        messenger: Arc<dyn MessagingPort>,
        audit: AuditLogger,
    ) -> Self {
        let rate_limiter = RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        );
        Self {
            cfg,
            store: Mutex::new(store),
            drafts: Mutex::new(PendingDrafts::new()),
            rate_limiter: Mutex::new(rate_limiter),
            messenger,
            audit,
        }
    }

    pub async fn handle(&self, update: IncomingUpdate) -> Result<()> {
        match update {
            IncomingUpdate::Command(cmd) => self.handle_command(cmd).await,
            IncomingUpdate::Message(msg) => self.handle_message(msg).await,
            IncomingUpdate::Callback(q) => self.handle_callback(q).await,
        }
    }

    // ============== Gatekeeping ==============

    /// Auth + rate limit. Replies to the user when the update is rejected.
    async fn admit(&self, from: &Sender) -> Result<bool> {
        if !is_authorized(Some(from.user_id), &self.cfg.telegram_allowed_users) {
            self.audit
                .record(AuditEvent::auth(from.user_id, from.display_name(), false));
            self.reply(from.chat_id, &render::unauthorized()).await?;
            return Ok(false);
        }

        let verdict = self.rate_limiter.lock().await.check(from.user_id);
        if let Err(wait) = verdict {
            let secs = wait.as_secs_f64();
            self.audit
                .record(AuditEvent::rate_limit(from.user_id, from.display_name(), secs));
            self.reply(from.chat_id, &render::rate_limited(secs)).await?;
            return Ok(false);
        }
        Ok(true)
    }

    // ============== Commands ==============

    pub async fn handle_command(&self, cmd: Command) -> Result<()> {
        if !self.admit(&cmd.from).await? {
            return Ok(());
        }
        self.audit.record(AuditEvent::message(
            cmd.from.user_id,
            cmd.from.display_name(),
            &cmd.name,
            &cmd.joined_args(),
        ));

        let chat = cmd.from.chat_id;
        match cmd.name.as_str() {
            "start" | "help" => self.reply(chat, &render::welcome()).await,
            "add" => self.cmd_add(&cmd).await,
            "list" => self.cmd_list(&cmd.from).await,
            "complete" | "delete" | "archive" => match id_arg(&cmd) {
                IdArg::Missing => self.reply(chat, &render::task_id_usage(&cmd.name)).await,
                IdArg::Invalid => self.reply(chat, &render::invalid_task_id()).await,
                IdArg::Valid(id) => {
                    let action = match cmd.name.as_str() {
                        "complete" => CallbackAction::Complete(id),
                        "delete" => CallbackAction::Delete(id),
                        _ => CallbackAction::Archive(id),
                    };
                    let Some(html) = self.apply_task_action(&cmd.from, action).await? else {
                        return Ok(());
                    };
                    self.reply(chat, &html).await
                }
            },
            "archived" => match id_arg(&cmd) {
                IdArg::Missing => self.cmd_archived_list(&cmd.from).await,
                IdArg::Invalid => self.reply(chat, &render::invalid_task_id()).await,
                IdArg::Valid(id) => self.cmd_archived_detail(&cmd.from, id).await,
            },
            "stats" => self.cmd_stats(&cmd.from).await,
            other => {
                tracing::debug!(command = other, "ignoring unknown command");
                Ok(())
            }
        }
    }

    async fn cmd_add(&self, cmd: &Command) -> Result<()> {
        let text = cmd.joined_args();
        if text.trim().is_empty() {
            return self.reply(cmd.from.chat_id, &render::add_usage()).await;
        }
        let user = cmd.from.user_id;
        let Some(task) = self
            .with_store(&cmd.from, "add", |s| s.add_task(user, text, None))
            .await?
        else {
            return Ok(());
        };
        self.audit_task(&cmd.from, "add", task.id, true);
        self.reply(cmd.from.chat_id, &render::task_added(&task)).await
    }

    async fn cmd_list(&self, from: &Sender) -> Result<()> {
        let tasks = self.store.lock().await.user_tasks(from.user_id).to_vec();
        if tasks.is_empty() {
            return self.reply(from.chat_id, &render::no_tasks()).await;
        }
        let (html, keyboard) = render::task_list(&tasks);
        self.reply_long(from.chat_id, &html, Some(keyboard)).await
    }

    async fn cmd_stats(&self, from: &Sender) -> Result<()> {
        let stats = self.store.lock().await.stats(from.user_id);
        if stats.total == 0 {
            return self.reply(from.chat_id, &render::no_stats()).await;
        }
        self.reply(from.chat_id, &render::stats(&stats)).await
    }

    async fn cmd_archived_list(&self, from: &Sender) -> Result<()> {
        let tasks = self.store.lock().await.archived_tasks(from.user_id).to_vec();
        if tasks.is_empty() {
            return self.reply(from.chat_id, &render::no_archived_tasks()).await;
        }
        self.reply_long(from.chat_id, &render::archived_list(&tasks), None)
            .await
    }

    async fn cmd_archived_detail(&self, from: &Sender, id: TaskId) -> Result<()> {
        let task = self
            .store
            .lock()
            .await
            .archived_task(from.user_id, id)
            .cloned();
        let Some(task) = task else {
            return self
                .reply(from.chat_id, &render::archived_detail_not_found(id))
                .await;
        };
        let (html, keyboard) = render::archived_detail(&task);
        self.reply_long(from.chat_id, &html, Some(keyboard)).await
    }

    // ============== Messages ==============

    pub async fn handle_message(&self, msg: IncomingMessage) -> Result<()> {
        if !self.admit(&msg.from).await? {
            return Ok(());
        }
        let from = &msg.from;
        let snap = &msg.snapshot;

        if snap.is_forwarded() {
            let extracted = extract_task(snap);
            let Some(content) = extracted.content else {
                return self
                    .reply(from.chat_id, &render::forward_not_extractable())
                    .await;
            };
            self.audit_message(from, "FORWARD", &content);
            let html = render::forwarded_preview(&content, extracted.link.as_deref());
            self.drafts.lock().await.stash_forwarded(
                from.user_id,
                ForwardedDraft {
                    content,
                    link: extracted.link,
                },
            );
            return self
                .ask_confirmation(from.chat_id, &html, CallbackAction::AddForwarded)
                .await;
        }

        if snap.has_media() {
            let Some(content) = extract_task(snap).content else {
                return self
                    .reply(from.chat_id, &render::media_not_extractable())
                    .await;
            };
            self.audit_message(from, "MEDIA", &content);
            let html = render::media_preview(&content);
            self.drafts.lock().await.stash_media(from.user_id, content);
            return self
                .ask_confirmation(from.chat_id, &html, CallbackAction::AddMedia)
                .await;
        }

        let Some(text) = snap.text.clone().filter(|t| !t.trim().is_empty()) else {
            return Ok(());
        };
        self.audit_message(from, "TEXT", &text);
        let html = render::regular_prompt(&text);
        self.drafts.lock().await.stash_regular(from.user_id, text);
        self.ask_confirmation(from.chat_id, &html, CallbackAction::AddRegular)
            .await
    }

    async fn ask_confirmation(&self, chat: ChatId, html: &str, add: CallbackAction) -> Result<()> {
        self.reply_long(chat, html, Some(render::confirm_keyboard(add)))
            .await
    }

    // ============== Callbacks ==============

    pub async fn handle_callback(&self, q: CallbackQuery) -> Result<()> {
        if !is_authorized(Some(q.from.user_id), &self.cfg.telegram_allowed_users) {
            self.audit
                .record(AuditEvent::auth(q.from.user_id, q.from.display_name(), false));
            return self
                .messenger
                .answer_callback_query(&q.callback_id, Some("Unauthorized"))
                .await;
        }

        // Always answer first so the client stops its loading spinner.
        self.messenger
            .answer_callback_query(&q.callback_id, None)
            .await?;

        let Some(action) = CallbackAction::parse(&q.data) else {
            tracing::debug!(data = %q.data, "ignoring unknown callback data");
            return Ok(());
        };

        let html = match action {
            CallbackAction::Complete(_)
            | CallbackAction::Delete(_)
            | CallbackAction::Archive(_)
            | CallbackAction::PermanentDelete(_) => {
                match self.apply_task_action(&q.from, action).await? {
                    Some(html) => html,
                    None => return Ok(()),
                }
            }
            CallbackAction::AddForwarded => {
                let draft = self.drafts.lock().await.take_forwarded(q.from.user_id);
                match draft {
                    Some(d) => match self.add_from_draft(&q.from, d.content, d.link).await? {
                        Some(task) => render::draft_added(&task, true),
                        None => return Ok(()),
                    },
                    None => render::draft_missing(),
                }
            }
            CallbackAction::AddRegular => {
                let draft = self.drafts.lock().await.take_regular(q.from.user_id);
                match draft {
                    Some(text) => match self.add_from_draft(&q.from, text, None).await? {
                        Some(task) => render::draft_added(&task, false),
                        None => return Ok(()),
                    },
                    None => render::draft_missing(),
                }
            }
            CallbackAction::AddMedia => {
                let draft = self.drafts.lock().await.take_media(q.from.user_id);
                match draft {
                    Some(content) => match self.add_from_draft(&q.from, content, None).await? {
                        Some(task) => render::draft_added(&task, true),
                        None => return Ok(()),
                    },
                    None => render::draft_missing(),
                }
            }
            CallbackAction::Cancel => {
                self.drafts.lock().await.clear(q.from.user_id);
                render::creation_cancelled()
            }
        };

        self.respond_to_callback(&q, &html).await
    }

    async fn add_from_draft(
        &self,
        from: &Sender,
        text: String,
        link: Option<String>,
    ) -> Result<Option<Task>> {
        let user = from.user_id;
        let task = self
            .with_store(from, "add", |s| s.add_task(user, text, link))
            .await?;
        if let Some(t) = &task {
            self.audit_task(from, "add", t.id, true);
        }
        Ok(task)
    }

    /// Edit the message carrying the pressed button, or post a new one.
    /// Text past the first chunk follows as new messages.
    async fn respond_to_callback(&self, q: &CallbackQuery, html: &str) -> Result<()> {
        let Some(msg) = q.message else {
            return self.reply(q.from.chat_id, html).await;
        };
        let mut chunks = split_html_chunks(html, self.chunk_limit()).into_iter();
        self.messenger
            .edit_html(msg, &chunks.next().unwrap_or_default())
            .await?;
        for chunk in chunks {
            self.messenger.send_html(msg.chat_id, &chunk).await?;
        }
        Ok(())
    }

    // ============== Shared ==============

    /// Run a per-task mutation and render its outcome. `None` means the
    /// store failed and the user was already told.
    async fn apply_task_action(
        &self,
        from: &Sender,
        action: CallbackAction,
    ) -> Result<Option<String>> {
        let user = from.user_id;
        let (name, id, outcome) = match action {
            CallbackAction::Complete(id) => (
                "complete",
                id,
                self.with_store(from, "complete", |s| s.complete_task(user, id))
                    .await?,
            ),
            CallbackAction::Delete(id) => (
                "delete",
                id,
                self.with_store(from, "delete", |s| s.delete_task(user, id))
                    .await?,
            ),
            CallbackAction::Archive(id) => (
                "archive",
                id,
                self.with_store(from, "archive", |s| s.archive_task(user, id))
                    .await?,
            ),
            CallbackAction::PermanentDelete(id) => (
                "purge",
                id,
                self.with_store(from, "purge", |s| {
                    s.permanently_delete_archived_task(user, id)
                })
                .await?,
            ),
            _ => return Ok(None),
        };
        let Some(ok) = outcome else {
            return Ok(None);
        };
        self.audit_task(from, name, id, ok);

        let html = match (name, ok) {
            ("complete", true) => render::completed(id),
            ("delete", true) => render::deleted(id),
            ("archive", true) => render::archived(id),
            ("archive", false) => render::not_found_or_not_completed(id),
            ("purge", true) => render::permanently_deleted(id),
            ("purge", false) => render::archived_not_found(id),
            _ => render::not_found(id),
        };
        Ok(Some(html))
    }

    /// Run `op` against the store. On failure the user gets a generic error
    /// and `None` is returned.
    async fn with_store<T>(
        &self,
        from: &Sender,
        context: &str,
        op: impl FnOnce(&mut TaskStore) -> Result<T>,
    ) -> Result<Option<T>> {
        let res = {
            let mut store = self.store.lock().await;
            op(&mut *store)
        };
        match res {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                tracing::error!(user = %from.user_id, "task store {context} failed: {e}");
                self.audit.record(AuditEvent::error(
                    from.user_id,
                    from.display_name(),
                    &e.to_string(),
                    Some(context),
                ));
                self.reply(from.chat_id, &render::storage_failed()).await?;
                Ok(None)
            }
        }
    }

    async fn reply(&self, chat: ChatId, html: &str) -> Result<()> {
        self.reply_long(chat, html, None).await
    }

    fn chunk_limit(&self) -> usize {
        self.cfg
            .telegram_safe_limit
            .min(self.messenger.capabilities().max_message_len)
    }

    /// Send possibly oversized HTML in chunks; the keyboard rides on the last one.
    async fn reply_long(
        &self,
        chat: ChatId,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        let mut chunks = split_html_chunks(html, self.chunk_limit());
        let last = chunks.pop().unwrap_or_default();
        for chunk in &chunks {
            self.messenger.send_html(chat, chunk).await?;
        }
        match keyboard.filter(|k| !k.is_empty()) {
            Some(kb) => {
                self.messenger.send_inline_keyboard(chat, &last, kb).await?;
            }
            None => {
                self.messenger.send_html(chat, &last).await?;
            }
        }
        Ok(())
    }

    fn audit_message(&self, from: &Sender, kind: &str, content: &str) {
        self.audit.record(AuditEvent::message(
            from.user_id,
            from.display_name(),
            kind,
            content,
        ));
    }

    fn audit_task(&self, from: &Sender, action: &str, id: TaskId, ok: bool) {
        self.audit.record(AuditEvent::task(
            from.user_id,
            from.display_name(),
            action,
            id,
            ok,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageId, MessageRef, UserId};
    use crate::extract::{Attachment, Forward, ForwardOrigin, MessageSnapshot};
    use crate::messaging::types::MessagingCapabilities;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum Sent {
        Html(String),
        Keyboard(String, InlineKeyboard),
        Edit(MessageRef, String),
        Answer(Option<String>),
    }

    #[derive(Default)]
    struct FakeMessenger {
        next_id: StdMutex<i32>,
        log: StdMutex<Vec<Sent>>,
    }

    impl FakeMessenger {
        fn alloc(&self, chat_id: ChatId) -> MessageRef {
            let mut guard = self.next_id.lock().unwrap();
            *guard += 1;
            MessageRef {
                chat_id,
                message_id: MessageId(*guard),
            }
        }

        fn take(&self) -> Vec<Sent> {
            std::mem::take(&mut *self.log.lock().unwrap())
        }

        fn last_text(&self) -> String {
            match self.log.lock().unwrap().last().cloned() {
                Some(Sent::Html(t)) | Some(Sent::Keyboard(t, _)) | Some(Sent::Edit(_, t)) => t,
                other => panic!("no text message sent, got {other:?}"),
            }
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                max_message_len: 4096,
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.log.lock().unwrap().push(Sent::Html(html.to_string()));
            Ok(self.alloc(chat_id))
        }

        async fn send_inline_keyboard(
            &self,
            chat_id: ChatId,
            html: &str,
            keyboard: InlineKeyboard,
        ) -> Result<MessageRef> {
            self.log
                .lock()
                .unwrap()
                .push(Sent::Keyboard(html.to_string(), keyboard));
            Ok(self.alloc(chat_id))
        }

        async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(Sent::Edit(msg, html.to_string()));
            Ok(())
        }

        async fn answer_callback_query(
            &self,
            _callback_id: &str,
            text: Option<&str>,
        ) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(Sent::Answer(text.map(str::to_string)));
            Ok(())
        }
    }

    const USER: UserId = UserId(100);
    const CHAT: ChatId = ChatId(100);
    const BUTTON_MSG: MessageRef = MessageRef {
        chat_id: CHAT,
        message_id: MessageId(77),
    };

    fn test_config(allowed: Vec<i64>, rate_limit_requests: u32) -> Arc<Config> {
        Arc::new(Config {
            telegram_bot_token: "x".to_string(),
            telegram_allowed_users: allowed,
            tasks_file: "unused".into(),
            archived_tasks_file: "unused".into(),
            telegram_safe_limit: 4000,
            audit_log_path: None,
            audit_log_json: false,
            rate_limit_enabled: true,
            rate_limit_requests,
            rate_limit_window: Duration::from_secs(3600),
        })
    }

    struct Harness {
        _dir: tempfile::TempDir,
        svc: TaskBotService,
        messenger: Arc<FakeMessenger>,
    }

    fn harness_with(cfg: Arc<Config>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(
            dir.path().join("tasks.json"),
            dir.path().join("archived_tasks.json"),
        );
        let messenger = Arc::new(FakeMessenger::default());
        let svc = TaskBotService::new(cfg, store, messenger.clone(), AuditLogger::disabled());
        Harness {
            _dir: dir,
            svc,
            messenger,
        }
    }

    fn harness() -> Harness {
        harness_with(test_config(vec![], 1000))
    }

    fn sender() -> Sender {
        Sender {
            chat_id: CHAT,
            user_id: USER,
            username: Some("tester".to_string()),
        }
    }

    fn command(text: &str) -> Command {
        Command::parse(sender(), text).unwrap()
    }

    fn press(data: &str) -> CallbackQuery {
        CallbackQuery {
            from: sender(),
            callback_id: "cb".to_string(),
            data: data.to_string(),
            message: Some(BUTTON_MSG),
        }
    }

    fn message(snapshot: MessageSnapshot) -> IncomingMessage {
        IncomingMessage {
            from: sender(),
            snapshot,
        }
    }

    impl Harness {
        async fn tasks(&self) -> Vec<Task> {
            self.svc.store.lock().await.user_tasks(USER).to_vec()
        }
    }

    #[tokio::test]
    async fn add_command_creates_task_and_confirms() {
        let h = harness();
        h.svc.handle_command(command("/add Buy   groceries")).await.unwrap();

        let tasks = h.tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].text, "Buy groceries");
        let reply = h.messenger.last_text();
        assert!(reply.starts_with("✅ Task added successfully!\n<b>Task #1:</b> Buy groceries"));
        assert!(reply.contains("<b>Status:</b> pending"));
    }

    #[tokio::test]
    async fn add_without_text_shows_usage() {
        let h = harness();
        h.svc.handle_command(command("/add")).await.unwrap();
        assert!(h.tasks().await.is_empty());
        assert_eq!(h.messenger.last_text(), render::add_usage());
    }

    #[tokio::test]
    async fn id_commands_validate_arguments() {
        let h = harness();
        h.svc.handle_command(command("/complete")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::task_id_usage("complete"));

        h.svc.handle_command(command("/delete abc")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::invalid_task_id());

        h.svc.handle_command(command("/archive 4")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::not_found_or_not_completed(4));

        h.svc.handle_command(command("/complete 4")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::not_found(4));
    }

    #[tokio::test]
    async fn complete_then_archive_then_purge() {
        let h = harness();
        h.svc.handle_command(command("/add Write report")).await.unwrap();

        h.svc.handle_command(command("/archive 1")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::not_found_or_not_completed(1));

        h.svc.handle_command(command("/complete 1")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::completed(1));

        h.svc.handle_command(command("/archive 1")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::archived(1));
        assert!(h.tasks().await.is_empty());

        h.messenger.take();
        h.svc.handle_command(command("/archived 1")).await.unwrap();
        match h.messenger.take().pop() {
            Some(Sent::Keyboard(text, kb)) => {
                assert!(text.contains("📦 <b>Archived Task #1</b>"));
                assert_eq!(kb.rows[0][0].callback_data, "perm_delete_1");
            }
            other => panic!("expected archived detail, got {other:?}"),
        }

        h.svc.handle_callback(press("perm_delete_1")).await.unwrap();
        assert_eq!(
            h.messenger.take(),
            vec![
                Sent::Answer(None),
                Sent::Edit(BUTTON_MSG, render::permanently_deleted(1)),
            ]
        );

        h.svc.handle_command(command("/archived")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::no_archived_tasks());
    }

    #[tokio::test]
    async fn list_sends_keyboard_and_buttons_mutate_tasks() {
        let h = harness();
        h.svc.handle_command(command("/list")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::no_tasks());

        h.svc.handle_command(command("/add one")).await.unwrap();
        h.svc.handle_command(command("/add two")).await.unwrap();
        h.messenger.take();

        h.svc.handle_command(command("/list")).await.unwrap();
        match h.messenger.take().as_slice() {
            [Sent::Keyboard(text, kb)] => {
                assert!(text.contains("⏳ <b>#1</b> one"));
                assert_eq!(kb.rows.len(), 2);
            }
            other => panic!("unexpected sends: {other:?}"),
        }

        h.svc.handle_callback(press("complete_2")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::completed(2));
        h.svc.handle_callback(press("delete_1")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::deleted(1));
        h.svc.handle_callback(press("delete_1")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::not_found(1));

        let tasks = h.tasks().await;
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].is_completed());
    }

    #[tokio::test]
    async fn long_list_is_split_with_keyboard_on_last_chunk() {
        let mut cfg = (*test_config(vec![], 1000)).clone();
        cfg.telegram_safe_limit = 200;
        let h = harness_with(Arc::new(cfg));
        for i in 0..12 {
            h.svc
                .handle_command(command(&format!("/add task number {i} with some padding")))
                .await
                .unwrap();
        }
        h.messenger.take();

        h.svc.handle_command(command("/list")).await.unwrap();
        let sent = h.messenger.take();
        assert!(sent.len() > 1);
        assert!(sent[..sent.len() - 1]
            .iter()
            .all(|s| matches!(s, Sent::Html(t) if t.len() <= 200)));
        match sent.last() {
            Some(Sent::Keyboard(_, kb)) => assert_eq!(kb.rows.len(), 12),
            other => panic!("expected keyboard last, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_text_needs_confirmation() {
        let h = harness();
        let snap = MessageSnapshot {
            text: Some("Call the plumber".to_string()),
            ..Default::default()
        };
        h.svc.handle_message(message(snap)).await.unwrap();

        match h.messenger.take().as_slice() {
            [Sent::Keyboard(text, kb)] => {
                assert_eq!(text, &render::regular_prompt("Call the plumber"));
                assert_eq!(kb.rows[0][0].callback_data, "add_regular_task");
                assert_eq!(kb.rows[0][1].callback_data, "cancel");
            }
            other => panic!("unexpected sends: {other:?}"),
        }
        assert!(h.tasks().await.is_empty());

        h.svc.handle_callback(press("add_regular_task")).await.unwrap();
        let tasks = h.tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].text, "Call the plumber");

        // The draft is consumed.
        h.svc.handle_callback(press("add_regular_task")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::draft_missing());
        assert_eq!(h.tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn forwarded_channel_post_keeps_link() {
        let h = harness();
        let snap = MessageSnapshot {
            forward: Some(Forward {
                origin: ForwardOrigin::Chat {
                    title: Some("Ops".to_string()),
                    first_name: None,
                    username: Some("ops_news".to_string()),
                    message_id: Some(55),
                },
                date: None,
            }),
            text: Some("Rotate the keys".to_string()),
            ..Default::default()
        };
        h.svc.handle_message(message(snap)).await.unwrap();
        match h.messenger.take().as_slice() {
            [Sent::Keyboard(text, kb)] => {
                assert!(text.starts_with("📨 <b>Forwarded Message Detected</b>"));
                assert!(text.contains("https://t.me/ops_news/55"));
                assert_eq!(kb.rows[0][0].callback_data, "add_forwarded_task");
            }
            other => panic!("unexpected sends: {other:?}"),
        }

        h.svc.handle_callback(press("add_forwarded_task")).await.unwrap();
        let tasks = h.tasks().await;
        assert_eq!(tasks[0].text, "From: Ops | Text: Rotate the keys");
        assert_eq!(
            tasks[0].message_link.as_deref(),
            Some("https://t.me/ops_news/55")
        );
        assert!(h.messenger.last_text().contains("Original Message"));
    }

    #[tokio::test]
    async fn media_draft_can_be_cancelled() {
        let h = harness();
        let snap = MessageSnapshot {
            caption: Some("receipt".to_string()),
            attachment: Some(Attachment::Photo),
            ..Default::default()
        };
        h.svc.handle_message(message(snap)).await.unwrap();
        match h.messenger.take().as_slice() {
            [Sent::Keyboard(text, _)] => {
                assert!(text.contains("Caption: receipt | 📷 Photo attached"));
            }
            other => panic!("unexpected sends: {other:?}"),
        }

        h.svc.handle_callback(press("cancel")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::creation_cancelled());

        h.svc.handle_callback(press("add_media_task")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::draft_missing());
        assert!(h.tasks().await.is_empty());
    }

    #[tokio::test]
    async fn stats_reflect_active_tasks() {
        let h = harness();
        h.svc.handle_command(command("/stats")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::no_stats());

        h.svc.handle_command(command("/add a")).await.unwrap();
        h.svc.handle_command(command("/add b")).await.unwrap();
        h.svc.handle_command(command("/complete 1")).await.unwrap();
        h.svc.handle_command(command("/stats")).await.unwrap();
        let text = h.messenger.last_text();
        assert!(text.contains("📝 Total tasks: 2"));
        assert!(text.contains("📈 Completion rate: 50.0%"));
    }

    #[tokio::test]
    async fn unauthorized_users_are_refused() {
        let h = harness_with(test_config(vec![1], 1000));
        h.svc.handle_command(command("/add secret")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::unauthorized());
        assert!(h.tasks().await.is_empty());

        h.svc.handle_callback(press("complete_1")).await.unwrap();
        assert_eq!(
            h.messenger.take().pop(),
            Some(Sent::Answer(Some("Unauthorized".to_string())))
        );
    }

    #[tokio::test]
    async fn rate_limit_blocks_commands_but_not_buttons() {
        let h = harness_with(test_config(vec![], 1));
        h.svc.handle_command(command("/add first")).await.unwrap();
        h.svc.handle_command(command("/add second")).await.unwrap();
        assert!(h.messenger.last_text().starts_with("⏳ Rate limited."));
        assert_eq!(h.tasks().await.len(), 1);

        h.svc.handle_callback(press("complete_1")).await.unwrap();
        assert_eq!(h.messenger.last_text(), render::completed(1));
    }

    #[tokio::test]
    async fn storage_failure_is_reported_to_user() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = TaskStore::open(blocker.join("tasks.json"), blocker.join("archive.json"));
        let messenger = Arc::new(FakeMessenger::default());
        let svc = TaskBotService::new(
            test_config(vec![], 1000),
            store,
            messenger.clone(),
            AuditLogger::disabled(),
        );

        svc.handle_command(command("/add doomed")).await.unwrap();
        assert_eq!(messenger.take(), vec![Sent::Html(render::storage_failed())]);

        // The failed add must not show up later.
        svc.handle_command(command("/list")).await.unwrap();
        assert_eq!(messenger.take(), vec![Sent::Html(render::no_tasks())]);
    }

    fn assert_all_within(sent: &[Sent], limit: usize) {
        for s in sent {
            let text = match s {
                Sent::Html(t) | Sent::Keyboard(t, _) | Sent::Edit(_, t) => t,
                Sent::Answer(_) => continue,
            };
            assert!(text.len() <= limit, "{} bytes sent in one message", text.len());
        }
    }

    #[tokio::test]
    async fn long_user_text_is_split_everywhere_it_is_echoed() {
        let h = harness();
        let long = "word ".repeat(900);

        h.svc
            .handle_message(message(MessageSnapshot {
                text: Some(long.clone()),
                ..Default::default()
            }))
            .await
            .unwrap();
        let sent = h.messenger.take();
        assert!(sent.len() > 1);
        assert_all_within(&sent, 4000);
        assert!(matches!(sent.last(), Some(Sent::Keyboard(_, _))));

        h.svc.handle_callback(press("add_regular_task")).await.unwrap();
        let sent = h.messenger.take();
        assert!(matches!(sent[1], Sent::Edit(..)));
        assert!(sent.len() > 2);
        assert_all_within(&sent, 4000);

        h.svc
            .handle_command(command(&format!("/add {long}")))
            .await
            .unwrap();
        h.svc.handle_command(command("/complete 2")).await.unwrap();
        h.svc.handle_command(command("/archive 2")).await.unwrap();
        h.messenger.take();

        h.svc.handle_command(command("/archived 2")).await.unwrap();
        let sent = h.messenger.take();
        assert!(sent.len() > 1);
        assert_all_within(&sent, 4000);
        match sent.last() {
            Some(Sent::Keyboard(_, kb)) => assert_eq!(kb.rows[0][0].callback_data, "perm_delete_2"),
            other => panic!("expected keyboard on last chunk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_command_and_callback_are_ignored() {
        let h = harness();
        h.svc.handle_command(command("/frobnicate")).await.unwrap();
        assert!(h.messenger.take().is_empty());

        h.svc.handle_callback(press("snooze_3")).await.unwrap();
        assert_eq!(h.messenger.take(), vec![Sent::Answer(None)]);
    }
}
