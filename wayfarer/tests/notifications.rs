//! Notification inbox and push delivery.

mod support;

use chrono::{Duration, Utc};
use support::{TestApp, test_config};
use wayfarer::{
    AppError,
    id::generate_id,
    models::{Notification, NotificationKind},
};

#[tokio::test]
async fn inbox_lists_newest_first_with_unread_count() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let carol = t.user("carol").await;
    t.follow(&bob, &alice).await;
    t.follow(&carol, &alice).await;

    let inbox = t.app.notifications().list(&alice.id, 1, None).await.unwrap();
    assert_eq!(inbox.page.total, 2);
    assert_eq!(inbox.unread_count, 2);
    assert_eq!(inbox.page.items[0].sender, carol.id);
    assert_eq!(inbox.page.items[0].kind, NotificationKind::Follow);
    assert!(t.app.notifications().list(&bob.id, 1, None).await.unwrap().page.items.is_empty());
}

#[tokio::test]
async fn mark_read_is_owner_only() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    t.follow(&bob, &alice).await;
    let id = t.app.notifications().list(&alice.id, 1, None).await.unwrap().page.items[0]
        .id
        .clone();

    let err = t.app.notifications().mark_read(&bob.id, &id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let err = t.app.notifications().mark_read(&alice.id, "missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let read = t.app.notifications().mark_read(&alice.id, &id).await.unwrap();
    assert!(read.is_read);
    assert_eq!(t.app.notifications().list(&alice.id, 1, None).await.unwrap().unread_count, 0);
}

#[tokio::test]
async fn mark_all_read_reports_how_many_flipped() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    for name in ["bob", "carol", "dave"] {
        let follower = t.user(name).await;
        t.follow(&follower, &alice).await;
    }
    let first = t.app.notifications().list(&alice.id, 1, None).await.unwrap().page.items[0]
        .id
        .clone();
    t.app.notifications().mark_read(&alice.id, &first).await.unwrap();

    assert_eq!(t.app.notifications().mark_all_read(&alice.id).await.unwrap(), 2);
    assert_eq!(t.app.notifications().mark_all_read(&alice.id).await.unwrap(), 0);
    let inbox = t.app.notifications().list(&alice.id, 1, None).await.unwrap();
    assert_eq!(inbox.unread_count, 0);
    assert!(inbox.page.items.iter().all(|notification| notification.is_read));
}

#[tokio::test]
async fn delete_is_owner_only() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    t.follow(&bob, &alice).await;
    let id = t.app.notifications().list(&alice.id, 1, None).await.unwrap().page.items[0]
        .id
        .clone();

    let err = t.app.notifications().delete(&bob.id, &id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    t.app.notifications().delete(&alice.id, &id).await.unwrap();
    assert_eq!(t.app.notifications().list(&alice.id, 1, None).await.unwrap().page.total, 0);
    let err = t.app.notifications().delete(&alice.id, &id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn disabled_push_still_records_notifications() {
    let mut config = test_config();
    config.push.enabled = false;
    let t = TestApp::with_config(config);
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    t.with_token(&alice).await;

    t.follow(&bob, &alice).await;

    assert!(t.push.sent().is_empty());
    assert_eq!(t.app.notifications().list(&alice.id, 1, None).await.unwrap().page.total, 1);
}

#[tokio::test]
async fn rejected_push_does_not_fail_the_action() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let token = t.with_token(&alice).await;
    t.push.reject_token(&token);

    t.follow(&bob, &alice).await;

    assert!(t.push.sent_to(&token).is_empty());
    assert!(t.reload(&alice.id).await.is_followed_by(&bob.id));
    assert_eq!(t.app.notifications().list(&alice.id, 1, None).await.unwrap().unread_count, 1);
}

#[tokio::test]
async fn expired_notifications_drop_out_of_totals() {
    let t = TestApp::new();
    let alice = t.user("alice").await;
    let bob = t.user("bob").await;
    let now = Utc::now();
    t.app
        .repos()
        .notifications
        .insert(&Notification {
            id: generate_id(),
            recipient: alice.id.clone(),
            sender: bob.id.clone(),
            kind: NotificationKind::Follow,
            post: None,
            comment: None,
            story: None,
            message: "bob started following you".to_string(),
            is_read: false,
            created_at: now - Duration::days(31),
            expires_at: now - Duration::days(1),
        })
        .await
        .unwrap();

    let inbox = t.app.notifications().list(&alice.id, 1, None).await.unwrap();
    assert!(inbox.page.items.is_empty());
    assert_eq!(inbox.page.total, 0);
    assert_eq!(inbox.page.total_pages, 0);
    assert_eq!(inbox.unread_count, 0);

    // listing only sweeps the indexes it reads; the collection-wide index is left for pruning
    let report = t.app.repos().notifications.prune_dangling().await.unwrap();
    assert!(report.index_entries >= 1, "{report:?}");
    let report = t.app.repos().notifications.prune_dangling().await.unwrap();
    assert_eq!(report.index_entries, 0);
}

#[tokio::test]
async fn out_of_range_paging_is_clamped() {
    let mut config = test_config();
    config.pagination.max_limit = 2;
    let t = TestApp::with_config(config);
    let alice = t.user("alice").await;
    for name in ["bob", "carol", "dave"] {
        let follower = t.user(name).await;
        t.follow(&follower, &alice).await;
    }

    let far = t.app.notifications().list(&alice.id, u64::MAX, None).await.unwrap();
    assert!(far.page.items.is_empty());
    assert_eq!(far.page.total, 3);

    let huge = t.app.notifications().list(&alice.id, 1, Some(u64::MAX)).await.unwrap();
    assert_eq!(huge.page.items.len(), 2);
    assert_eq!(huge.page.total_pages, 2);
    assert_eq!(huge.unread_count, 3);

    let both = t.app.notifications().list(&alice.id, u64::MAX, Some(u64::MAX)).await.unwrap();
    assert!(both.page.items.is_empty());
}
