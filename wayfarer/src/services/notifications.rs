use std::time::Duration;

use serde::Serialize;

use crate::{
    collaborators::{PushData, PushMessage},
    context::Wayfarer,
    errors::{AppError, AppResult, RepoError},
    id::generate_id,
    models::{Notification, NotificationKind, notification::notification_lifetime},
    repository::{IndexQuery, Patch},
    runtime::DocumentStore,
    services::{ensure, missing},
    types::{Page, SortOrder, monotonic_now},
};

/// An interaction worth telling the recipient about.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub recipient: String,
    pub sender: String,
    pub kind: NotificationKind,
    pub post: Option<String>,
    pub comment: Option<String>,
    pub story: Option<String>,
    pub message: String,
    /// Push title; `None` records the notification without pushing.
    pub push_title: Option<String>,
    pub push_data: PushData,
}

impl NotificationEvent {
    pub fn new(recipient: &str, sender: &str, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            recipient: recipient.to_string(),
            sender: sender.to_string(),
            kind,
            post: None,
            comment: None,
            story: None,
            message: message.into(),
            push_title: None,
            push_data: PushData::new(),
        }
    }

    pub fn post(mut self, post_id: &str) -> Self {
        self.post = Some(post_id.to_string());
        self
    }

    pub fn comment(mut self, comment_id: &str) -> Self {
        self.comment = Some(comment_id.to_string());
        self
    }

    pub fn story(mut self, story_id: &str) -> Self {
        self.story = Some(story_id.to_string());
        self
    }

    pub fn push(mut self, title: &str) -> Self {
        self.push_title = Some(title.to_string());
        self
    }
}

/// Records notifications and forwards pushes. Never fails the caller.
pub struct Notifier<'a, S: DocumentStore> {
    app: &'a Wayfarer<S>,
}

impl<'a, S: DocumentStore> Notifier<'a, S> {
    pub fn new(app: &'a Wayfarer<S>) -> Self {
        Self { app }
    }

    /// Writes one notification and pushes to the recipient's token, if any.
    pub async fn dispatch(&self, event: NotificationEvent) -> Option<Notification> {
        let now = monotonic_now();
        let notification = Notification {
            id: generate_id(),
            recipient: event.recipient.clone(),
            sender: event.sender.clone(),
            kind: event.kind,
            post: event.post.clone(),
            comment: event.comment.clone(),
            story: event.story.clone(),
            message: event.message.clone(),
            is_read: false,
            created_at: now,
            expires_at: now + notification_lifetime(),
        };
        let recorded = match self.app.repos().notifications.insert(&notification).await {
            Ok(recorded) => Some(recorded),
            Err(err) => {
                log::warn!("failed to record {:?} notification for {}: {err}", event.kind, event.recipient);
                None
            }
        };

        if let Some(title) = &event.push_title {
            let mut message = PushMessage::new(title.clone(), event.message.clone());
            message.data = event.push_data.clone();
            self.push_to_user(&event.recipient, message).await;
        }
        recorded
    }

    /// Pushes without recording a notification. Returns whether a push was accepted.
    pub async fn push_to_user(&self, user_id: &str, message: PushMessage) -> bool {
        if !self.app.config().push.enabled {
            return false;
        }
        let token = match self.app.repos().users.get(user_id).await {
            Ok(Some(user)) => user.push_token,
            Ok(None) => None,
            Err(err) => {
                log::warn!("failed to load push token for {user_id}: {err}");
                None
            }
        };
        match token {
            Some(token) if !token.is_empty() => self.send(&token, &message).await,
            _ => false,
        }
    }

    /// Pushes one message to many tokens; returns how many were accepted.
    pub async fn multicast(&self, tokens: &[String], message: PushMessage) -> usize {
        if !self.app.config().push.enabled || tokens.is_empty() {
            return 0;
        }
        match tokio::time::timeout(self.timeout(), self.app.push().send_multicast(tokens, &message)).await {
            Ok(Ok(report)) => report.success_count,
            Ok(Err(err)) => {
                log::warn!("multicast \"{}\" failed: {err}", message.title);
                0
            }
            Err(_) => {
                log::warn!("multicast \"{}\" timed out", message.title);
                0
            }
        }
    }

    async fn send(&self, token: &str, message: &PushMessage) -> bool {
        match tokio::time::timeout(self.timeout(), self.app.push().send(token, message)).await {
            Ok(Ok(receipt)) => {
                log::debug!("push \"{}\" accepted as {}", message.title, receipt.message_id);
                true
            }
            Ok(Err(err)) => {
                log::warn!("push \"{}\" failed: {err}", message.title);
                false
            }
            Err(_) => {
                log::warn!("push \"{}\" timed out", message.title);
                false
            }
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.app.config().push.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    #[serde(flatten)]
    pub page: Page<Notification>,
    pub unread_count: u64,
}

pub struct NotificationService<'a, S: DocumentStore> {
    app: &'a Wayfarer<S>,
}

impl<'a, S: DocumentStore> NotificationService<'a, S> {
    pub fn new(app: &'a Wayfarer<S>) -> Self {
        Self { app }
    }

    fn unread_query(user_id: &str) -> IndexQuery {
        IndexQuery::eq("recipient", user_id).and("is_read", Some(false.to_string()))
    }

    pub async fn list(&self, user_id: &str, page: u64, limit: Option<u64>) -> AppResult<NotificationPage> {
        let repo = &self.app.repos().notifications;
        let request = self.app.page(page, limit, self.app.config().pagination.notifications);
        let page = repo
            .list(&IndexQuery::eq("recipient", user_id), request, SortOrder::Desc)
            .await?;
        let unread_count = repo.count(&Self::unread_query(user_id)).await?;
        Ok(NotificationPage { page, unread_count })
    }

    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> AppResult<Notification> {
        let repo = &self.app.repos().notifications;
        let notification = repo
            .get(notification_id)
            .await?
            .ok_or_else(|| AppError::not_found("notification"))?;
        ensure(notification.recipient == user_id, "not your notification")?;
        let outcome = repo
            .patch(notification_id, Patch::new().assign("is_read", true))
            .await
            .map_err(missing("notification"))?;
        Ok(outcome.document)
    }

    /// Returns how many notifications flipped to read.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        let repo = &self.app.repos().notifications;
        let unread = repo.list_all(&Self::unread_query(user_id), SortOrder::Asc).await?;
        let mut marked = 0;
        for notification in unread {
            let outcome = repo
                .patch(
                    &notification.id,
                    Patch::new().guard("is_read", false).assign("is_read", true),
                )
                .await;
            match outcome {
                Ok(outcome) if outcome.applied => marked += 1,
                Ok(_) | Err(RepoError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(marked)
    }

    pub async fn delete(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        let repo = &self.app.repos().notifications;
        let notification = repo
            .get(notification_id)
            .await?
            .ok_or_else(|| AppError::not_found("notification"))?;
        ensure(notification.recipient == user_id, "not your notification")?;
        repo.delete(notification_id).await?;
        Ok(())
    }
}
