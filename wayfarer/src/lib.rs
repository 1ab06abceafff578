//! Wayfarer core library.
//!
//! A social travel-diary backend: accounts and the follow graph, posts with
//! reactions, threaded comments, expiring stories, direct chats, business mail
//! and notifications. Documents live in Redis (or [`MemoryStore`] for tests and
//! local runs) and every counter or set edit is applied by one atomic store
//! command.

extern crate self as wayfarer;

pub mod auth;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod errors;
pub mod id;
pub mod keys;
pub mod models;
pub mod repository;
pub mod response;
pub mod runtime;
pub mod services;
pub mod types;
pub mod validators;

pub use collaborators::{
    LogPushDispatcher, MediaStore, MemoryMediaStore, PushDispatcher, RecordingPushDispatcher,
};
pub use config::WayfarerConfig;
pub use context::{Repos, Wayfarer};
pub use errors::{AppError, AppResult, RepoError, UnauthorizedKind, ValidationError};
pub use repository::{IndexQuery, Patch, Repo};
pub use response::{ApiResponse, ErrorResponse};
pub use runtime::{DocumentStore, MemoryStore, RedisStore};
pub use types::{Document, Page, PageRequest, SortOrder};
pub use wayfarer_macros::Document;

// Re-export redis so callers don't need to pin a matching version
pub use redis;

// Used by the `Document` derive for collection registration
pub use inventory;
