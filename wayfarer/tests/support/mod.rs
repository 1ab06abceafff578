//! Shared fixtures: a `Wayfarer` over `MemoryStore` with in-memory collaborators.

#![allow(dead_code)]

use std::sync::Arc;

use wayfarer::{
    MemoryMediaStore, MemoryStore, RecordingPushDispatcher, Wayfarer, WayfarerConfig,
    config::StoreBackend,
    models::{AccountType, User},
    services::Registration,
};

pub struct TestApp {
    pub app: Wayfarer<MemoryStore>,
    pub media: Arc<MemoryMediaStore>,
    pub push: Arc<RecordingPushDispatcher>,
}

/// Literal secrets and a cheap argon2 cost keep tests hermetic and fast.
pub fn test_config() -> WayfarerConfig {
    let mut config = WayfarerConfig::default();
    config.store.backend = StoreBackend::Memory;
    config.store.prefix = "test".to_string();
    config.auth.access_secret = "access-secret-for-tests".to_string();
    config.auth.refresh_secret = "refresh-secret-for-tests".to_string();
    config.auth.argon2_memory_kib = 1024;
    config.auth.argon2_iterations = 1;
    config.auth.argon2_parallelism = 1;
    config.push.timeout_ms = 1_000;
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: WayfarerConfig) -> Self {
        let media = Arc::new(MemoryMediaStore::new("https://cdn.test"));
        let push = Arc::new(RecordingPushDispatcher::new());
        let app = Wayfarer::new(MemoryStore::new(), config, media.clone(), push.clone()).expect("wayfarer");
        Self { app, media, push }
    }

    pub async fn register(&self, username: &str, account_type: AccountType) -> User {
        let session = self
            .app
            .identity()
            .register(Registration {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: "correct horse".to_string(),
                full_name: format!("{username} traveller"),
                account_type,
            })
            .await
            .expect("register");
        self.reload(&session.user.id).await
    }

    pub async fn user(&self, username: &str) -> User {
        self.register(username, AccountType::Personal).await
    }

    pub async fn business(&self, username: &str) -> User {
        self.register(username, AccountType::Business).await
    }

    pub async fn reload(&self, user_id: &str) -> User {
        self.app.repos().users.get(user_id).await.expect("get user").expect("user exists")
    }

    /// Gives the user a push token equal to `"token-{username}"` and returns it.
    pub async fn with_token(&self, user: &User) -> String {
        let token = format!("token-{}", user.username);
        self.app
            .identity()
            .update_push_token(&user.id, Some(token.clone()))
            .await
            .expect("push token");
        token
    }

    pub async fn follow(&self, actor: &User, target: &User) {
        let outcome = self.app.identity().toggle_follow(actor, &target.id).await.expect("follow");
        assert!(outcome.is_following, "{} already followed {}", actor.username, target.username);
    }

    pub async fn befriend(&self, a: &User, b: &User) {
        self.follow(a, b).await;
        self.follow(b, a).await;
    }
}
