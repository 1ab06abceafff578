//! Persisted documents.

pub mod chat;
pub mod comment;
pub mod mail;
pub mod media;
pub mod notification;
pub mod post;
pub mod story;
pub mod user;

pub use chat::{Chat, Message, MessageKind, ReadReceipt};
pub use comment::Comment;
pub use mail::BusinessMail;
pub use media::{ImageRef, MediaItem, MediaKind};
pub use notification::{Notification, NotificationKind};
pub use post::{Post, PostDraft, PostType};
pub use story::{Story, StoryView};
pub use user::{AccountType, PublicUser, User, UserSummary};
