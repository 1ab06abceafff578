//! Post creation, feed assembly and reactions.

mod support;

use support::TestApp;
use wayfarer::{
    AppError,
    collaborators::MediaUpload,
    models::{NotificationKind, PostDraft, PostType, User},
};

fn draft(caption: &str) -> PostDraft {
    PostDraft {
        caption: caption.to_string(),
        post_type: PostType::Image,
        location: "Lisbon".to_string(),
        tags: Some("sea, sun,, ".to_string()),
    }
}

async fn post(t: &TestApp, owner: &User, caption: &str) -> String {
    t.app
        .posts()
        .create_post(owner, draft(caption), vec![MediaUpload::image(b"jpeg".to_vec())])
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn create_post_uploads_media_and_counts() {
    let t = TestApp::new();
    let alice = t.user("alice").await;

    let created = t
        .app
        .posts()
        .create_post(
            &alice,
            draft("  Sunset  "),
            vec![MediaUpload::image(b"jpeg".to_vec()), MediaUpload::video(b"mp4".to_vec())],
        )
        .await
        .unwrap();
    assert_eq!(created.caption, "Sunset");
    assert_eq!(created.tags, vec!["sea", "sun"]);
    assert_eq!(created.media.len(), 2);
    assert!(created.media[0].public_id.starts_with("travel-diary/posts/"));
    assert!(created.media[1].thumbnail.is_some());
    assert_eq!(t.media.len(), 2);
    assert_eq!(t.reload(&alice.id).await.posts_count, 1);
}

#[tokio::test]
async fn create_post_requires_supported_media() {
    let t = TestApp::new();
    let alice = t.user("alice").await;

    let err = t.app.posts().create_post(&alice, draft("x"), vec![]).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = t
        .app
        .posts()
        .create_post(
            &alice,
            draft("x"),
            vec![MediaUpload::image(b"ok".to_vec()), MediaUpload::new(b"%PDF".to_vec(), "application/pdf")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(t.media.is_empty());
}

#[tokio::test]
async fn failed_upload_creates_nothing() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    t.media.set_failing(true);

    let err = t
        .app
        .posts()
        .create_post(&alice, draft("x"), vec![MediaUpload::image(b"jpeg".to_vec())])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Media(_)));
    assert_eq!(err.status_code(), 500);
    assert_eq!(t.reload(&alice.id).await.posts_count, 0);
    let page = t.app.posts().user_posts(&alice.id, None, 1, None).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn new_post_is_multicast_to_followers() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let carol = t.user("carol").await;
    t.follow(&bob, &alice).await;
    t.follow(&carol, &alice).await;
    let bob_token = t.with_token(&bob).await;

    let post_id = post(&t, &alice, "hello").await;

    let pushes = t.push.sent_to(&bob_token);
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].title, "New Post");
    assert_eq!(pushes[0].body, "alice shared a new image");
    assert_eq!(pushes[0].data.get("postId"), Some(&post_id));
    // carol has no token
    assert_eq!(t.push.sent().len(), 1);
}

#[tokio::test]
async fn feed_merges_followed_authors_newest_first() {
    let t = TestApp::new();
    let viewer = t.user("viewer").await;
    let alice = t.user("alice").await;
    let stranger = t.user("stranger").await;
    t.follow(&viewer, &alice).await;

    let a1 = post(&t, &alice, "a1").await;
    let v1 = post(&t, &viewer, "v1").await;
    post(&t, &stranger, "s1").await;
    let a2 = post(&t, &alice, "a2").await;

    let feed = t.app.posts().feed(&viewer.id, 1, None).await.unwrap();
    let ids: Vec<String> = feed.items.iter().map(|post| post.id.clone()).collect();
    assert_eq!(ids, vec![a2.clone(), v1.clone(), a1.clone()]);
    assert_eq!(feed.total, 3);

    let second = t.app.posts().feed(&viewer.id, 2, Some(2)).await.unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].id, a1);
    assert_eq!(second.total_pages, 2);
}

#[tokio::test]
async fn user_posts_filter_by_type() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    post(&t, &alice, "photo").await;
    let mut short = draft("clip");
    short.post_type = PostType::Short;
    t.app
        .posts()
        .create_post(&alice, short, vec![MediaUpload::video(b"mp4".to_vec())])
        .await
        .unwrap();

    let all = t.app.posts().user_posts(&alice.id, None, 1, None).await.unwrap();
    assert_eq!(all.total, 2);
    let shorts = t
        .app
        .posts()
        .user_posts(&alice.id, Some(PostType::Short), 1, None)
        .await
        .unwrap();
    assert_eq!(shorts.total, 1);
    assert_eq!(shorts.items[0].caption, "clip");
}

#[tokio::test]
async fn like_and_dislike_are_exclusive() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let post_id = post(&t, &alice, "p").await;
    let posts = t.app.posts();

    let liked = posts.toggle_like(&bob, &post_id).await.unwrap();
    assert_eq!((liked.likes_count, liked.dislikes_count), (1, 0));
    assert!(liked.has_liked && !liked.has_disliked);

    let disliked = posts.toggle_dislike(&bob, &post_id).await.unwrap();
    assert_eq!((disliked.likes_count, disliked.dislikes_count), (0, 1));
    assert!(!disliked.has_liked && disliked.has_disliked);

    let cleared = posts.toggle_dislike(&bob, &post_id).await.unwrap();
    assert_eq!((cleared.likes_count, cleared.dislikes_count), (0, 0));

    posts.toggle_like(&bob, &post_id).await.unwrap();
    let restored = posts.toggle_like(&bob, &post_id).await.unwrap();
    assert_eq!((restored.likes_count, restored.dislikes_count), (0, 0));
    assert!(!restored.has_liked);

    let err = posts.toggle_like(&bob, "missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn likes_notify_the_owner_but_not_self() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let post_id = post(&t, &alice, "p").await;

    t.app.posts().toggle_like(&alice, &post_id).await.unwrap();
    assert_eq!(t.app.notifications().list(&alice.id, 1, None).await.unwrap().page.total, 0);

    t.app.posts().toggle_like(&bob, &post_id).await.unwrap();
    let page = t.app.notifications().list(&alice.id, 1, None).await.unwrap();
    assert_eq!(page.page.total, 1);
    let notification = &page.page.items[0];
    assert_eq!(notification.kind, NotificationKind::Like);
    assert_eq!(notification.post.as_deref(), Some(post_id.as_str()));
    assert_eq!(notification.sender, bob.id);
}

#[tokio::test]
async fn views_and_shares_count_every_call() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let post_id = post(&t, &alice, "p").await;
    t.app.posts().toggle_like(&bob, &post_id).await.unwrap();

    t.app.posts().view_post(&bob.id, &post_id).await.unwrap();
    let view = t.app.posts().view_post(&bob.id, &post_id).await.unwrap();
    assert_eq!(view.post.views_count, 2);
    assert!(view.has_liked);
    assert!(!view.has_disliked);

    assert_eq!(t.app.posts().share_post(&post_id).await.unwrap(), 1);
    assert_eq!(t.app.posts().share_post(&post_id).await.unwrap(), 2);
}

#[tokio::test]
async fn only_the_owner_deletes_and_media_goes_too() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let post_id = post(&t, &alice, "p").await;
    let alice = t.reload(&alice.id).await;
    assert_eq!(t.media.len(), 1);

    let err = t.app.posts().delete_post(&bob, &post_id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(err.status_code(), 403);

    t.app.posts().delete_post(&alice, &post_id).await.unwrap();
    assert!(t.media.is_empty());
    assert_eq!(t.reload(&alice.id).await.posts_count, 0);
    let err = t.app.posts().view_post(&bob.id, &post_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
