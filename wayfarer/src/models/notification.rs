use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Document;

pub fn notification_lifetime() -> Duration {
    Duration::days(30)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Follow,
    Like,
    Dislike,
    Comment,
    Reply,
    Mention,
    Share,
    StoryView,
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(collection = "notifications", index_together = ["recipient", "is_read"])]
pub struct Notification {
    #[document(id)]
    pub id: String,
    #[document(index)]
    pub recipient: String,
    pub sender: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub post: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub story: Option<String>,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[document(created_at)]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[document(expires_at)]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_as_type() {
        let now = Utc::now();
        let notification = Notification {
            id: "n1".into(),
            recipient: "u1".into(),
            sender: "u2".into(),
            kind: NotificationKind::StoryView,
            post: None,
            comment: None,
            story: Some("s1".into()),
            message: "viewed your story".into(),
            is_read: false,
            created_at: now,
            expires_at: now + notification_lifetime(),
        };
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "story_view");
        let indexes: Vec<Vec<&str>> = Notification::schema().indexes.into_iter().map(|index| index.fields).collect();
        assert!(indexes.contains(&vec!["recipient", "is_read"]));
    }
}
