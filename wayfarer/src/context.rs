use std::sync::Arc;

use crate::{
    auth::{Passwords, TokenIssuer},
    collaborators::{MediaFolder, MediaStore, PushDispatcher},
    config::WayfarerConfig,
    errors::{AppError, AppResult},
    models::{BusinessMail, Chat, Comment, Message, Notification, Post, Story, User},
    repository::Repo,
    runtime::DocumentStore,
    services::{
        ChatService, CommentService, IdentityService, MailService, NotificationService, Notifier, PostService,
        StoryService,
    },
    types::PageRequest,
};

/// One repository per collection, all over the same store and prefix.
pub struct Repos<S: DocumentStore> {
    pub users: Repo<User, S>,
    pub posts: Repo<Post, S>,
    pub comments: Repo<Comment, S>,
    pub stories: Repo<Story, S>,
    pub chats: Repo<Chat, S>,
    pub messages: Repo<Message, S>,
    pub mails: Repo<BusinessMail, S>,
    pub notifications: Repo<Notification, S>,
}

impl<S: DocumentStore> Repos<S> {
    pub fn new(store: &S, prefix: &str) -> Self {
        Self {
            users: Repo::new(store.clone(), prefix),
            posts: Repo::new(store.clone(), prefix),
            comments: Repo::new(store.clone(), prefix),
            stories: Repo::new(store.clone(), prefix),
            chats: Repo::new(store.clone(), prefix),
            messages: Repo::new(store.clone(), prefix),
            mails: Repo::new(store.clone(), prefix),
            notifications: Repo::new(store.clone(), prefix),
        }
    }
}

struct Inner<S: DocumentStore> {
    config: WayfarerConfig,
    store: S,
    repos: Repos<S>,
    media: Arc<dyn MediaStore>,
    push: Arc<dyn PushDispatcher>,
    passwords: Passwords,
    tokens: TokenIssuer,
}

/// Entry point for every service operation.
///
/// Collaborators are injected at construction; cloning shares the same store,
/// repositories and clients.
///
/// ```ignore
/// let app = Wayfarer::new(store, config, Arc::new(media), Arc::new(LogPushDispatcher))?;
/// let session = app.identity().register(registration).await?;
/// let feed = app.posts().feed(&session.user.id, 1, None).await?;
/// ```
pub struct Wayfarer<S: DocumentStore> {
    inner: Arc<Inner<S>>,
}

impl<S: DocumentStore> Clone for Wayfarer<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DocumentStore> Wayfarer<S> {
    /// Resolves secrets from the environment where the config references them.
    pub fn new(
        store: S,
        config: WayfarerConfig,
        media: Arc<dyn MediaStore>,
        push: Arc<dyn PushDispatcher>,
    ) -> AppResult<Self> {
        let access_secret = config
            .access_secret()
            .map_err(|e| AppError::Unexpected(e.to_string()))?;
        let refresh_secret = config
            .refresh_secret()
            .map_err(|e| AppError::Unexpected(e.to_string()))?;
        let tokens = TokenIssuer::new(
            &access_secret,
            &refresh_secret,
            chrono::Duration::seconds(config.auth.access_ttl_secs),
            chrono::Duration::seconds(config.auth.refresh_ttl_secs),
        );
        let passwords = Passwords::from_settings(&config.auth)?;
        let repos = Repos::new(&store, &config.store.prefix);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                repos,
                media,
                push,
                passwords,
                tokens,
            }),
        })
    }

    pub fn config(&self) -> &WayfarerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn repos(&self) -> &Repos<S> {
        &self.inner.repos
    }

    pub fn media(&self) -> &dyn MediaStore {
        self.inner.media.as_ref()
    }

    pub fn push(&self) -> &dyn PushDispatcher {
        self.inner.push.as_ref()
    }

    pub fn passwords(&self) -> &Passwords {
        &self.inner.passwords
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.inner.tokens
    }

    pub fn folder(&self, folder: MediaFolder) -> String {
        folder.path(&self.inner.config.media.root_folder)
    }

    /// `limit` falls back to the listing's configured default and never exceeds `pagination.max_limit`.
    pub fn page(&self, page: u64, limit: Option<u64>, default_limit: u64) -> PageRequest {
        let limit = limit.unwrap_or(default_limit).min(self.inner.config.pagination.max_limit);
        PageRequest::new(page, limit)
    }

    pub fn notifier(&self) -> Notifier<'_, S> {
        Notifier::new(self)
    }

    pub fn identity(&self) -> IdentityService<'_, S> {
        IdentityService::new(self)
    }

    pub fn posts(&self) -> PostService<'_, S> {
        PostService::new(self)
    }

    pub fn comments(&self) -> CommentService<'_, S> {
        CommentService::new(self)
    }

    pub fn stories(&self) -> StoryService<'_, S> {
        StoryService::new(self)
    }

    pub fn chats(&self) -> ChatService<'_, S> {
        ChatService::new(self)
    }

    pub fn mail(&self) -> MailService<'_, S> {
        MailService::new(self)
    }

    pub fn notifications(&self) -> NotificationService<'_, S> {
        NotificationService::new(self)
    }
}
