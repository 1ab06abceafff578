use crate::{
    collaborators::{MediaFolder, MediaUpload, PushMessage},
    context::Wayfarer,
    errors::{AppError, AppResult, RepoError},
    id::generate_id,
    models::{
        Chat, MediaKind, Message, MessageKind, ReadReceipt, User,
        chat::MESSAGE_MAX,
    },
    repository::{IndexQuery, Patch},
    runtime::DocumentStore,
    services::{bounded_text, check_media_type, discard_media, ensure, missing, upload_media},
    types::{Page, SortOrder, monotonic_now},
};

/// What a user sends: text, plus at most one of a file or a shared post.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub text: Option<String>,
    pub shared_post: Option<String>,
    pub file: Option<MediaUpload>,
}

impl MessageDraft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Direct conversations between two users who follow each other.
pub struct ChatService<'a, S: DocumentStore> {
    app: &'a Wayfarer<S>,
}

impl<'a, S: DocumentStore> ChatService<'a, S> {
    pub fn new(app: &'a Wayfarer<S>) -> Self {
        Self { app }
    }

    /// Loads a chat the actor takes part in.
    async fn load(&self, actor_id: &str, chat_id: &str) -> AppResult<Chat> {
        let chat = self
            .app
            .repos()
            .chats
            .get(chat_id)
            .await?
            .ok_or_else(|| AppError::not_found("chat"))?;
        ensure(chat.is_participant(actor_id), "you are not a participant of this chat")?;
        Ok(chat)
    }

    /// Returns the existing chat for the pair or creates it; concurrent calls converge.
    pub async fn get_or_create_chat(&self, actor: &User, other_id: &str) -> AppResult<Chat> {
        if actor.id == other_id {
            return Err(AppError::invalid("user_id", "cannot start a chat with yourself"));
        }
        let other = self
            .app
            .repos()
            .users
            .get(other_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;
        ensure(!other.is_business(), "business accounts cannot be messaged directly")?;

        let actor = self
            .app
            .repos()
            .users
            .get(&actor.id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;
        ensure(
            actor.follows(&other.id) && actor.is_followed_by(&other.id),
            "you can only chat with users who follow you back",
        )?;

        let chat = Chat::between(generate_id(), &actor.id, &other.id, monotonic_now());
        let result = self.app.repos().chats.get_or_create("pair_key", &chat).await?;
        if result.was_created() {
            log::debug!("opened chat {} between {} and {}", chat.id, actor.id, other.id);
        }
        Ok(result.into_inner())
    }

    /// The actor's chats, most recent activity first.
    pub async fn chats(&self, actor_id: &str) -> AppResult<Vec<Chat>> {
        let mut chats = self
            .app
            .repos()
            .chats
            .list_all(&IndexQuery::eq("participants", actor_id), SortOrder::Desc)
            .await?;
        chats.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        Ok(chats)
    }

    pub async fn send_message(&self, actor: &User, chat_id: &str, draft: MessageDraft) -> AppResult<Message> {
        let chat = self.load(&actor.id, chat_id).await?;
        let MessageDraft { text, shared_post, file } = draft;
        if file.is_some() && shared_post.is_some() {
            return Err(AppError::invalid("media", "send either a file or a shared post, not both"));
        }
        let text = text
            .map(|text| bounded_text("text", &text, MESSAGE_MAX, false))
            .transpose()?
            .filter(|text| !text.is_empty());
        if file.is_none() && shared_post.is_none() && text.is_none() {
            return Err(AppError::invalid("text", "message text is required"));
        }
        if let Some(file) = &file {
            check_media_type("media", file)?;
        }
        if let Some(post_id) = &shared_post
            && self.app.repos().posts.get(post_id).await?.is_none()
        {
            return Err(AppError::not_found("post"));
        }

        let media = match &file {
            Some(file) => Some(upload_media(self.app, file, MediaFolder::Chats).await?),
            None => None,
        };
        let kind = match (&media, &shared_post) {
            (Some(item), _) if item.kind == MediaKind::Video => MessageKind::Video,
            (Some(_), _) => MessageKind::Image,
            (None, Some(_)) => MessageKind::Post,
            (None, None) => MessageKind::Text,
        };

        let now = monotonic_now();
        let message = Message {
            id: generate_id(),
            chat: chat.id.clone(),
            sender: actor.id.clone(),
            kind,
            text,
            media,
            shared_post,
            read_by: Vec::new(),
            is_read: false,
            created_at: now,
        };
        let message = match self.app.repos().messages.insert(&message).await {
            Ok(message) => message,
            Err(err) => {
                if let Some(item) = &message.media {
                    discard_media(self.app, std::slice::from_ref(item)).await;
                }
                return Err(err.into());
            }
        };

        let other = chat.other_participant(&actor.id).map(str::to_string);
        let mut patch = Patch::new()
            .assign("last_message", &message.id)
            .assign("last_message_time", now.timestamp_millis())
            .assign("updated_at", now.timestamp_millis());
        if let Some(other) = &other {
            patch = patch.map_increment("unread_counts", other, 1);
        }
        if let Err(err) = self.app.repos().chats.patch(&chat.id, patch).await {
            if let Err(cleanup) = self.app.repos().messages.delete(&message.id).await {
                log::warn!("failed to roll back message {}: {cleanup}", message.id);
            }
            if let Some(item) = &message.media {
                discard_media(self.app, std::slice::from_ref(item)).await;
            }
            return Err(missing("chat")(err));
        }

        if let Some(other) = &other {
            let body = message
                .text
                .clone()
                .unwrap_or_else(|| "Sent a media file".to_string());
            let push = PushMessage::new(actor.username.clone(), body)
                .with_data("type", "message")
                .with_data("chatId", chat.id.clone());
            self.app.notifier().push_to_user(other, push).await;
        }
        Ok(message)
    }

    /// The newest page of messages, oldest first within the page.
    pub async fn messages(&self, actor_id: &str, chat_id: &str, page: u64, limit: Option<u64>) -> AppResult<Page<Message>> {
        let chat = self.load(actor_id, chat_id).await?;
        let request = self.app.page(page, limit, self.app.config().pagination.messages);
        let mut page = self
            .app
            .repos()
            .messages
            .list(&IndexQuery::eq("chat", chat.id), request, SortOrder::Desc)
            .await?;
        page.items.reverse();
        Ok(page)
    }

    /// Clears the actor's unread counter and marks incoming messages read.
    pub async fn mark_read(&self, actor_id: &str, chat_id: &str) -> AppResult<u64> {
        let chat = self.load(actor_id, chat_id).await?;
        self.app
            .repos()
            .chats
            .patch(&chat.id, Patch::new().map_assign("unread_counts", actor_id, 0))
            .await
            .map_err(missing("chat"))?;

        let repo = &self.app.repos().messages;
        let unread = repo
            .list_all(
                &IndexQuery::eq("chat", chat.id.as_str()).and("is_read", Some(false.to_string())),
                SortOrder::Asc,
            )
            .await?;
        let mut marked = 0;
        for message in unread.iter().filter(|message| message.sender != actor_id) {
            let receipt = ReadReceipt {
                user: actor_id.to_string(),
                read_at: monotonic_now(),
            };
            let patch = Patch::new()
                .guard("is_read", false)
                .assign("is_read", true)
                .append("read_by", &receipt, Some("user"), None);
            match repo.patch(&message.id, patch).await {
                Ok(outcome) if outcome.applied => marked += 1,
                Ok(_) | Err(RepoError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(marked)
    }
}
