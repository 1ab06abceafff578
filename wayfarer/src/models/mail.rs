use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Document;

pub const SUBJECT_MAX: usize = 200;
pub const MAIL_BODY_MAX: usize = 10_000;
pub const REPLY_PREFIX: &str = "Re: ";

/// An inquiry addressed to a business account, or a reply to one.
#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(collection = "mails", index_together = ["recipient", "is_read"])]
pub struct BusinessMail {
    #[document(id)]
    pub id: String,
    #[document(index)]
    pub sender: String,
    #[document(index)]
    pub recipient: String,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub replied: bool,
    #[document(index)]
    #[serde(default)]
    pub parent_mail: Option<String>,
    #[document(created_at)]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl BusinessMail {
    pub fn involves(&self, user_id: &str) -> bool {
        self.sender == user_id || self.recipient == user_id
    }
}
