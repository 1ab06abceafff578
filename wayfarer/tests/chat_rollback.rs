//! A message whose chat update fails is rolled back with its media.

mod support;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde_json::Value;
use support::test_config;
use wayfarer::{
    AppError, DocumentStore, IndexQuery, MemoryMediaStore, MemoryStore, RecordingPushDispatcher, RepoError, SortOrder,
    Wayfarer,
    collaborators::MediaUpload,
    models::{AccountType, User},
    runtime::MutationCommand,
    services::{MessageDraft, Registration},
};

/// Delegates to [`MemoryStore`] but rejects chat patches while `fail_chat_patches` is set.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_chat_patches: Arc<AtomicBool>,
}

impl DocumentStore for FlakyStore {
    async fn execute(&self, command: &MutationCommand) -> Result<Value, RepoError> {
        if let MutationCommand::Patch(patch) = command
            && patch.schema.key_prefix.ends_with(":chats")
            && self.fail_chat_patches.load(Ordering::SeqCst)
        {
            return Err(RepoError::Other {
                message: "connection reset".into(),
            });
        }
        self.inner.execute(command).await
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, RepoError> {
        self.inner.fetch(key).await
    }

    async fn fetch_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, RepoError> {
        self.inner.fetch_many(keys).await
    }

    async fn index_range(
        &self,
        key: &str,
        offset: u64,
        limit: Option<u64>,
        order: SortOrder,
    ) -> Result<Vec<String>, RepoError> {
        self.inner.index_range(key, offset, limit, order).await
    }

    async fn index_entries(&self, key: &str) -> Result<Vec<(String, i64)>, RepoError> {
        self.inner.index_entries(key).await
    }

    async fn index_count(&self, key: &str) -> Result<u64, RepoError> {
        self.inner.index_count(key).await
    }

    async fn index_remove(&self, key: &str, members: &[String]) -> Result<u64, RepoError> {
        self.inner.index_remove(key, members).await
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, RepoError> {
        self.inner.scan_keys(pattern).await
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<u64, RepoError> {
        self.inner.delete_keys(keys).await
    }
}

async fn register(app: &Wayfarer<FlakyStore>, username: &str) -> User {
    let session = app
        .identity()
        .register(Registration {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "correct horse".to_string(),
            full_name: format!("{username} traveller"),
            account_type: AccountType::Personal,
        })
        .await
        .expect("register");
    app.repos().users.get(&session.user.id).await.expect("get user").expect("user exists")
}

#[tokio::test]
async fn failed_chat_update_rolls_back_the_message() {
    let store = FlakyStore::default();
    let media = Arc::new(MemoryMediaStore::new("https://cdn.test"));
    let push = Arc::new(RecordingPushDispatcher::new());
    let app = Wayfarer::new(store.clone(), test_config(), media.clone(), push).expect("wayfarer");

    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    app.identity().toggle_follow(&alice, &bob.id).await.unwrap();
    app.identity().toggle_follow(&bob, &alice.id).await.unwrap();
    let alice = app.repos().users.get(&alice.id).await.unwrap().unwrap();
    let chat = app.chats().get_or_create_chat(&alice, &bob.id).await.unwrap();

    store.fail_chat_patches.store(true, Ordering::SeqCst);
    let draft = MessageDraft {
        text: Some("look at this view".to_string()),
        file: Some(MediaUpload::image(b"jpeg".to_vec())),
        ..MessageDraft::default()
    };
    let err = app.chats().send_message(&alice, &chat.id, draft).await.unwrap_err();
    assert!(matches!(err, AppError::Unexpected(_)));

    let by_chat = IndexQuery::eq("chat", chat.id.clone());
    assert_eq!(app.repos().messages.count(&by_chat).await.unwrap(), 0);
    assert!(media.is_empty());
    let chat = app.repos().chats.get(&chat.id).await.unwrap().unwrap();
    assert!(chat.last_message.is_none());

    store.fail_chat_patches.store(false, Ordering::SeqCst);
    app.chats()
        .send_message(&alice, &chat.id, MessageDraft::text("second try"))
        .await
        .unwrap();
    assert_eq!(app.repos().messages.count(&by_chat).await.unwrap(), 1);
}
