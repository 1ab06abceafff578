use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Document, models::media::MediaItem, types::lenient};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Image,
    Video,
    Short,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Image => "image",
            PostType::Video => "video",
            PostType::Short => "short",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(collection = "posts", index_together = ["owner", "post_type"])]
pub struct Post {
    #[document(id)]
    pub id: String,
    #[document(index)]
    pub owner: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub media: Vec<MediaItem>,
    #[serde(default)]
    pub caption: String,
    pub post_type: PostType,
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub likes: Vec<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub dislikes: Vec<String>,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub dislikes_count: u64,
    #[serde(default)]
    pub comments_count: u64,
    #[serde(default)]
    pub views_count: u64,
    #[serde(default)]
    pub shares_count: u64,
    #[document(created_at)]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn has_liked(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }

    pub fn has_disliked(&self, user_id: &str) -> bool {
        self.dislikes.iter().any(|id| id == user_id)
    }
}

/// Caller-supplied fields of a new post; media arrives separately.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub caption: String,
    pub post_type: PostType,
    pub location: String,
    /// Comma separated, as typed by the user.
    pub tags: Option<String>,
}

impl PostDraft {
    pub fn parsed_tags(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|tags| {
                tags.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_split_and_trimmed() {
        let draft = PostDraft {
            tags: Some(" alps, hiking ,,snow".into()),
            ..PostDraft::default()
        };
        assert_eq!(draft.parsed_tags(), vec!["alps", "hiking", "snow"]);
        assert!(PostDraft::default().parsed_tags().is_empty());
    }

    #[test]
    fn empty_sets_round_trip_through_cjson_shape() {
        let raw = r#"{"id":"p1","owner":"u1","media":{},"post_type":"video","tags":{},"likes":{},"dislikes":{},"created_at":1700000000000}"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert!(post.likes.is_empty() && post.media.is_empty());
        assert_eq!(post.post_type, PostType::Video);
    }
}
