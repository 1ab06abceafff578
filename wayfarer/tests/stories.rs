//! Expiring stories, view tracking and grouping.

mod support;

use chrono::{Duration, Utc};
use support::TestApp;
use wayfarer::{
    AppError,
    collaborators::MediaUpload,
    id::generate_id,
    models::{MediaItem, MediaKind, Story, User},
};

async fn story(t: &TestApp, owner: &User, caption: &str) -> Story {
    t.app
        .stories()
        .create_story(owner, caption, Some(MediaUpload::image(b"jpeg".to_vec())))
        .await
        .unwrap()
}

/// Writes a story whose window has already closed.
async fn expired_story(t: &TestApp, owner: &User) -> Story {
    let now = Utc::now();
    let story = Story {
        id: generate_id(),
        owner: owner.id.clone(),
        media: MediaItem {
            public_id: "travel-diary/stories/old".to_string(),
            url: "https://cdn.test/travel-diary/stories/old".to_string(),
            kind: MediaKind::Image,
            thumbnail: None,
            duration: None,
        },
        caption: String::new(),
        viewers: vec![],
        views_count: 0,
        created_at: now - Duration::hours(25),
        expires_at: now - Duration::hours(1),
    };
    t.app.repos().stories.insert(&story).await.unwrap()
}

#[tokio::test]
async fn create_story_needs_exactly_one_file() {
    let t = TestApp::new();
    let alice = t.user("alice").await;

    let err = t.app.stories().create_story(&alice, "no file", None).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = t
        .app
        .stories()
        .create_story(&alice, &"x".repeat(501), Some(MediaUpload::image(b"jpeg".to_vec())))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(t.media.is_empty());

    let created = story(&t, &alice, "  beach ").await;
    assert_eq!(created.caption, "beach");
    assert_eq!(created.expires_at - created.created_at, Duration::hours(24));
    assert!(created.media.public_id.starts_with("travel-diary/stories/"));
}

#[tokio::test]
async fn double_view_counts_once() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let created = story(&t, &alice, "s").await;

    let first = t.app.stories().view_story(&bob.id, &created.id).await.unwrap();
    let second = t.app.stories().view_story(&bob.id, &created.id).await.unwrap();
    assert_eq!(first.views_count, 1);
    assert_eq!(second.views_count, 1);
    assert_eq!(second.viewers.len(), 1);
    assert_eq!(second.viewers[0].viewed_at, first.viewers[0].viewed_at);
    assert!(second.has_viewed(&bob.id));
}

#[tokio::test]
async fn expired_stories_read_as_missing() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let old = expired_story(&t, &alice).await;
    let live = story(&t, &alice, "live").await;

    let err = t.app.stories().view_story(&bob.id, &old.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = t.app.stories().story_viewers(&alice, &old.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let listed = t.app.stories().user_stories(&alice.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, live.id);
}

#[tokio::test]
async fn following_stories_group_by_newest_author() {
    let t = TestApp::new();
    let viewer = t.user("viewer").await;
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let stranger = t.user("stranger").await;
    t.follow(&viewer, &alice).await;
    t.follow(&viewer, &bob).await;

    let a1 = story(&t, &alice, "a1").await;
    let own = story(&t, &viewer, "mine").await;
    story(&t, &stranger, "hidden").await;
    let b1 = story(&t, &bob, "b1").await;
    let a2 = story(&t, &alice, "a2").await;
    t.app.stories().view_story(&viewer.id, &a1.id).await.unwrap();

    let groups = t.app.stories().following_stories(&viewer.id).await.unwrap();
    let authors: Vec<&str> = groups.iter().map(|group| group.user.username.as_str()).collect();
    assert_eq!(authors, vec!["alice", "bob", "viewer"]);

    let alice_items: Vec<(&str, bool)> = groups[0]
        .stories
        .iter()
        .map(|item| (item.story.id.as_str(), item.has_viewed))
        .collect();
    assert_eq!(alice_items, vec![(a1.id.as_str(), true), (a2.id.as_str(), false)]);
    assert_eq!(groups[1].stories[0].story.id, b1.id);
    assert_eq!(groups[2].stories[0].story.id, own.id);
}

#[tokio::test]
async fn only_the_owner_sees_viewers() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let created = story(&t, &alice, "s").await;
    t.app.stories().view_story(&bob.id, &created.id).await.unwrap();

    let err = t.app.stories().story_viewers(&bob, &created.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let viewers = t.app.stories().story_viewers(&alice, &created.id).await.unwrap();
    assert_eq!(viewers.len(), 1);
    assert_eq!(viewers[0].user.id, bob.id);
}

#[tokio::test]
async fn delete_story_removes_media() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let created = story(&t, &alice, "s").await;
    assert!(t.media.contains(&created.media.public_id));

    let err = t.app.stories().delete_story(&bob, &created.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    t.app.stories().delete_story(&alice, &created.id).await.unwrap();
    assert!(!t.media.contains(&created.media.public_id));
    assert!(t.app.stories().user_stories(&alice.id).await.unwrap().is_empty());
}
