use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Document, id::pair_key, models::media::MediaItem, types::lenient};

pub const MESSAGE_MAX: usize = 5000;

/// A two-party conversation, unique per unordered participant pair.
#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(collection = "chats")]
pub struct Chat {
    #[document(id)]
    pub id: String,
    #[document(unique)]
    pub pair_key: String,
    #[document(index)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_message_time: DateTime<Utc>,
    /// Participant id to unread message count.
    #[serde(default)]
    pub unread_counts: BTreeMap<String, u64>,
    #[document(created_at)]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn between(id: String, a: &str, b: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            pair_key: pair_key(a, b),
            participants: vec![a.to_string(), b.to_string()],
            last_message: None,
            last_message_time: now,
            unread_counts: BTreeMap::from([(a.to_string(), 0), (b.to_string(), 0)]),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|id| id == user_id)
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .map(String::as_str)
            .find(|id| *id != user_id)
    }

    pub fn unread_for(&self, user_id: &str) -> u64 {
        self.unread_counts.get(user_id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    Post,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(collection = "messages", index_together = ["chat", "is_read"])]
pub struct Message {
    #[document(id)]
    pub id: String,
    #[document(index)]
    pub chat: String,
    pub sender: String,
    #[serde(rename = "message_type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media: Option<MediaItem>,
    #[serde(default)]
    pub shared_post: Option<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub read_by: Vec<ReadReceipt>,
    #[serde(default)]
    pub is_read: bool,
    #[document(created_at)]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_between_starts_with_zero_unread() {
        let chat = Chat::between("c1".into(), "bob", "alice", Utc::now());
        assert_eq!(chat.pair_key, "alice:bob");
        assert_eq!(chat.unread_for("alice"), 0);
        assert_eq!(chat.unread_for("bob"), 0);
        assert_eq!(chat.other_participant("bob"), Some("alice"));
        assert!(!chat.is_participant("carol"));
    }
}
