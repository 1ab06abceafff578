use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Document, models::media::MediaItem, types::lenient};

pub const STORY_CAPTION_MAX: usize = 500;

pub fn story_lifetime() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryView {
    pub user: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(collection = "stories")]
pub struct Story {
    #[document(id)]
    pub id: String,
    #[document(index)]
    pub owner: String,
    pub media: MediaItem,
    #[serde(default)]
    pub caption: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub viewers: Vec<StoryView>,
    #[serde(default)]
    pub views_count: u64,
    #[document(created_at)]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[document(expires_at)]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Story {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn has_viewed(&self, user_id: &str) -> bool {
        self.viewers.iter().any(|view| view.user == user_id)
    }
}
