use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Document, types::lenient};

pub const COMMENT_MAX: usize = 2000;
pub const DELETED_PLACEHOLDER: &str = "[deleted]";

/// A comment on a post; `parent_comment` nests replies to any depth.
///
/// Soft-deleted comments keep their document but leave every secondary index,
/// so listings skip them while replies still resolve their parent.
#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(
    collection = "comments",
    index_together = ["post", "parent_comment"],
    hidden_when = "is_deleted"
)]
pub struct Comment {
    #[document(id)]
    pub id: String,
    #[document(index)]
    pub post: String,
    #[document(index)]
    pub author: String,
    pub text: String,
    #[document(index)]
    #[serde(default)]
    pub parent_comment: Option<String>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub likes: Vec<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub dislikes: Vec<String>,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub dislikes_count: u64,
    #[serde(default)]
    pub replies_count: u64,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[document(created_at)]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn has_liked(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }

    pub fn has_disliked(&self, user_id: &str) -> bool {
        self.dislikes.iter().any(|id| id == user_id)
    }

    pub fn is_reply(&self) -> bool {
        self.parent_comment.is_some()
    }
}
