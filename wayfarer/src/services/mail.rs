use serde::Serialize;

use crate::{
    collaborators::PushMessage,
    context::Wayfarer,
    errors::{AppError, AppResult},
    id::generate_id,
    models::{
        BusinessMail, User,
        mail::{MAIL_BODY_MAX, REPLY_PREFIX, SUBJECT_MAX},
    },
    repository::{IndexQuery, Patch},
    runtime::DocumentStore,
    services::{bounded_text, ensure, missing},
    types::{Page, SortOrder, monotonic_now},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxPage {
    #[serde(flatten)]
    pub page: Page<BusinessMail>,
    pub unread_count: u64,
}

/// Inquiries to business accounts and their replies.
pub struct MailService<'a, S: DocumentStore> {
    app: &'a Wayfarer<S>,
}

impl<'a, S: DocumentStore> MailService<'a, S> {
    pub fn new(app: &'a Wayfarer<S>) -> Self {
        Self { app }
    }

    async fn load(&self, mail_id: &str) -> AppResult<BusinessMail> {
        self.app
            .repos()
            .mails
            .get(mail_id)
            .await?
            .ok_or_else(|| AppError::not_found("mail"))
    }

    async fn write(
        &self,
        sender: &User,
        recipient_id: &str,
        subject: String,
        message: &str,
        parent_mail: Option<String>,
    ) -> AppResult<BusinessMail> {
        let subject = bounded_text("subject", &subject, SUBJECT_MAX, true)?;
        let message = bounded_text("message", message, MAIL_BODY_MAX, true)?;
        let mail = BusinessMail {
            id: generate_id(),
            sender: sender.id.clone(),
            recipient: recipient_id.to_string(),
            subject,
            message,
            is_read: false,
            replied: false,
            parent_mail,
            created_at: monotonic_now(),
        };
        Ok(self.app.repos().mails.insert(&mail).await?)
    }

    pub async fn send_mail(&self, sender: &User, recipient_id: &str, subject: &str, message: &str) -> AppResult<BusinessMail> {
        let recipient = self
            .app
            .repos()
            .users
            .get(recipient_id)
            .await?
            .ok_or_else(|| AppError::not_found("recipient"))?;
        ensure(recipient.is_business(), "mail can only be sent to business accounts")?;

        let mail = self
            .write(sender, &recipient.id, subject.to_string(), message, None)
            .await?;
        let push = PushMessage::new(
            "New Business Inquiry",
            format!("{}: {}", sender.username, mail.subject),
        )
        .with_data("type", "mail")
        .with_data("mailId", mail.id.clone());
        self.app.notifier().push_to_user(&recipient.id, push).await;
        Ok(mail)
    }

    /// Answers a mail addressed to the actor; the reply goes back to its sender.
    pub async fn reply(&self, actor: &User, mail_id: &str, subject: &str, message: &str) -> AppResult<BusinessMail> {
        let original = self.load(mail_id).await?;
        ensure(original.recipient == actor.id, "only the recipient can reply to this mail")?;

        let subject = format!("{REPLY_PREFIX}{}", subject.trim());
        let reply = self
            .write(actor, &original.sender, subject, message, Some(original.id.clone()))
            .await?;
        self.app
            .repos()
            .mails
            .patch(&original.id, Patch::new().assign("replied", true))
            .await
            .map_err(missing("mail"))?;

        let push = PushMessage::new("Mail Reply", format!("{} replied to your inquiry", actor.username))
            .with_data("type", "mail")
            .with_data("mailId", reply.id.clone());
        self.app.notifier().push_to_user(&original.sender, push).await;
        Ok(reply)
    }

    pub async fn inbox(&self, user_id: &str, page: u64, limit: Option<u64>) -> AppResult<InboxPage> {
        let repo = &self.app.repos().mails;
        let request = self.app.page(page, limit, self.app.config().pagination.mails);
        let page = repo
            .list(&IndexQuery::eq("recipient", user_id), request, SortOrder::Desc)
            .await?;
        let unread_count = repo
            .count(&IndexQuery::eq("recipient", user_id).and("is_read", Some(false.to_string())))
            .await?;
        Ok(InboxPage { page, unread_count })
    }

    pub async fn sent(&self, user_id: &str, page: u64, limit: Option<u64>) -> AppResult<Page<BusinessMail>> {
        let request = self.app.page(page, limit, self.app.config().pagination.mails);
        Ok(self
            .app
            .repos()
            .mails
            .list(&IndexQuery::eq("sender", user_id), request, SortOrder::Desc)
            .await?)
    }

    /// The root mail followed by its replies, oldest first.
    pub async fn thread(&self, actor_id: &str, mail_id: &str) -> AppResult<Vec<BusinessMail>> {
        let mut root = self.load(mail_id).await?;
        ensure(root.involves(actor_id), "you are not part of this conversation")?;

        if root.recipient == actor_id && !root.is_read {
            let outcome = self
                .app
                .repos()
                .mails
                .patch(&root.id, Patch::new().assign("is_read", true))
                .await
                .map_err(missing("mail"))?;
            root = outcome.document;
        }

        let replies = self
            .app
            .repos()
            .mails
            .list_all(&IndexQuery::eq("parent_mail", root.id.as_str()), SortOrder::Asc)
            .await?;
        let mut thread = Vec::with_capacity(replies.len() + 1);
        thread.push(root);
        thread.extend(replies);
        Ok(thread)
    }

    pub async fn delete_mail(&self, actor_id: &str, mail_id: &str) -> AppResult<()> {
        let mail = self.load(mail_id).await?;
        ensure(mail.involves(actor_id), "you are not authorized to delete this mail")?;
        self.app.repos().mails.delete(mail_id).await?;
        Ok(())
    }
}
