use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Document, models::media::ImageRef, types::lenient};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Personal,
    Business,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Personal => "personal",
            AccountType::Business => "business",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(collection = "users")]
pub struct User {
    #[document(id)]
    pub id: String,
    #[document(unique(case_insensitive))]
    pub username: String,
    #[document(unique(case_insensitive))]
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    #[document(index)]
    pub account_type: AccountType,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_picture: ImageRef,
    #[serde(default)]
    pub cover_photo: Option<ImageRef>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub business_email: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub followers: Vec<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub following: Vec<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub posts_count: u64,
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub blocked_users: Vec<String>,
    #[document(created_at)]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_business(&self) -> bool {
        self.account_type == AccountType::Business
    }

    pub fn follows(&self, other_id: &str) -> bool {
        self.following.iter().any(|id| id == other_id)
    }

    pub fn is_followed_by(&self, other_id: &str) -> bool {
        self.followers.iter().any(|id| id == other_id)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            profile_picture: self.profile_picture.url.clone(),
            account_type: self.account_type,
            is_verified: self.is_verified,
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            account_type: self.account_type,
            bio: self.bio.clone(),
            profile_picture: self.profile_picture.clone(),
            cover_photo: self.cover_photo.clone(),
            location: self.location.clone(),
            website: self.website.clone(),
            business_email: self.business_email.clone(),
            followers_count: self.followers_count,
            following_count: self.following_count,
            posts_count: self.posts_count,
            is_verified: self.is_verified,
            is_private: self.is_private,
            created_at: self.created_at,
        }
    }
}

/// Generated avatar used until a user uploads a profile picture.
pub fn default_avatar_url(full_name: &str, account_type: AccountType) -> String {
    let name: String = url::form_urlencoded::byte_serialize(full_name.as_bytes()).collect();
    let background = match account_type {
        AccountType::Business => "4285F4",
        AccountType::Personal => "34A853",
    };
    format!("https://ui-avatars.com/api/?name={name}&size=512&background={background}&color=fff&bold=true")
}

/// Fields shown next to content the user authored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub profile_picture: String,
    pub account_type: AccountType,
    pub is_verified: bool,
}

/// A user without credentials or edge sets.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub account_type: AccountType,
    pub bio: String,
    pub profile_picture: ImageRef,
    pub cover_photo: Option<ImageRef>,
    pub location: String,
    pub website: String,
    pub business_email: String,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
    pub is_verified: bool,
    pub is_private: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}
