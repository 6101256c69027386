//! Content waiting for the user to press "Add as Task".
//!
//! Each user has one slot per source (forwarded message, plain text, media).
//! A new message of the same kind replaces the pending draft.

use std::collections::HashMap;

use crate::domain::UserId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardedDraft {
    pub content: String,
    pub link: Option<String>,
}

#[derive(Clone, Debug, Default)]
struct UserDrafts {
    forwarded: Option<ForwardedDraft>,
    regular: Option<String>,
    media: Option<String>,
}

impl UserDrafts {
    fn is_empty(&self) -> bool {
        self.forwarded.is_none() && self.regular.is_none() && self.media.is_none()
    }
}

#[derive(Debug, Default)]
pub struct PendingDrafts {
    by_user: HashMap<UserId, UserDrafts>,
}

impl PendingDrafts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stash_forwarded(&mut self, user: UserId, draft: ForwardedDraft) {
        self.by_user.entry(user).or_default().forwarded = Some(draft);
    }

    pub fn stash_regular(&mut self, user: UserId, text: String) {
        self.by_user.entry(user).or_default().regular = Some(text);
    }

    pub fn stash_media(&mut self, user: UserId, content: String) {
        self.by_user.entry(user).or_default().media = Some(content);
    }

    pub fn take_forwarded(&mut self, user: UserId) -> Option<ForwardedDraft> {
        self.take_with(user, |d| d.forwarded.take())
    }

    pub fn take_regular(&mut self, user: UserId) -> Option<String> {
        self.take_with(user, |d| d.regular.take())
    }

    pub fn take_media(&mut self, user: UserId) -> Option<String> {
        self.take_with(user, |d| d.media.take())
    }

    /// Drop every pending draft of the user. Returns whether anything was pending.
    pub fn clear(&mut self, user: UserId) -> bool {
        self.by_user
            .remove(&user)
            .map(|d| !d.is_empty())
            .unwrap_or(false)
    }

    fn take_with<T>(
        &mut self,
        user: UserId,
        f: impl FnOnce(&mut UserDrafts) -> Option<T>,
    ) -> Option<T> {
        let drafts = self.by_user.get_mut(&user)?;
        let out = f(drafts);
        if drafts.is_empty() {
            self.by_user.remove(&user);
        }
        out
    }
}
