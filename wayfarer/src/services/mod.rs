//! Service operations, one module per area of the product.
//!
//! Every operation returns [`AppResult`](crate::errors::AppResult). Counter and
//! set edits go through a single store command; notifications are handed to the
//! [`Notifier`] only after the primary write has committed.

pub mod chats;
pub mod comments;
pub mod identity;
pub mod mail;
pub mod notifications;
pub mod posts;
pub mod stories;

pub use chats::{ChatService, MessageDraft};
pub use comments::CommentService;
pub use identity::{AuthSession, FollowOutcome, IdentityService, Profile, ProfileChanges, ProfileUploads, Registration};
pub use mail::{InboxPage, MailService};
pub use notifications::{NotificationEvent, NotificationPage, NotificationService, Notifier};
pub use posts::{PostService, PostView, ReactionOutcome};
pub use stories::{StoryGroup, StoryItem, StoryService, StoryViewer};

use crate::{
    collaborators::{MediaFolder, MediaUpload},
    context::Wayfarer,
    errors::{AppError, AppResult, RepoError},
    models::MediaItem,
    runtime::DocumentStore,
};

/// Maps a missing document to `NotFound(what)`; other failures convert as usual.
pub(crate) fn missing(what: &'static str) -> impl FnOnce(RepoError) -> AppError {
    move |err| match err {
        RepoError::NotFound { .. } => AppError::not_found(what),
        other => other.into(),
    }
}

pub(crate) fn ensure(condition: bool, reason: &str) -> AppResult<()> {
    if condition {
        Ok(())
    } else {
        Err(AppError::forbidden(reason))
    }
}

/// Rejects anything that is neither an image nor a video before any upload starts.
pub(crate) fn check_media_type(field: &str, upload: &MediaUpload) -> AppResult<()> {
    if upload.is_image() || upload.is_video() {
        Ok(())
    } else {
        Err(AppError::invalid(
            field,
            format!("unsupported media type `{}`", upload.content_type),
        ))
    }
}

/// Uploads one file to the folder, as an image or a video by content type.
pub(crate) async fn upload_media<S: DocumentStore>(
    app: &Wayfarer<S>,
    upload: &MediaUpload,
    folder: MediaFolder,
) -> AppResult<MediaItem> {
    let folder = app.folder(folder);
    if upload.is_video() {
        Ok(app.media().upload_video(&upload.bytes, &folder).await?.into())
    } else if upload.is_image() {
        Ok(app.media().upload_image(&upload.bytes, &folder).await?.into())
    } else {
        Err(crate::collaborators::MediaError::UnsupportedType(upload.content_type.clone()).into())
    }
}

/// Best-effort removal of media whose document was never written.
pub(crate) async fn discard_media<S: DocumentStore>(app: &Wayfarer<S>, items: &[MediaItem]) {
    for item in items {
        if let Err(err) = app.media().delete(&item.public_id).await {
            log::warn!("failed to discard orphaned media {}: {err}", item.public_id);
        }
    }
}

/// Trimmed text bounded by `max` characters; `required` rejects empty input.
pub(crate) fn bounded_text(field: &str, value: &str, max: usize, required: bool) -> AppResult<String> {
    let trimmed = value.trim();
    if required && trimmed.is_empty() {
        return Err(AppError::invalid(field, format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(AppError::invalid(field, format!("length must be at most {max}")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_text_trims_and_limits() {
        assert_eq!(bounded_text("text", "  hi  ", 5, true).unwrap(), "hi");
        assert!(bounded_text("text", "   ", 5, true).is_err());
        assert_eq!(bounded_text("caption", "", 5, false).unwrap(), "");
        assert!(bounded_text("text", "toolong", 5, true).is_err());
    }

    #[test]
    fn missing_maps_not_found_only() {
        let err = missing("post")(RepoError::NotFound { entity_id: Some("p1".into()) });
        assert!(matches!(err, AppError::NotFound(what) if what == "post"));
        let err = missing("post")(RepoError::InvalidRequest { message: "x".into() });
        assert!(matches!(err, AppError::Unexpected(_)));
    }

    #[test]
    fn media_types_are_checked() {
        assert!(check_media_type("media", &MediaUpload::image(vec![1])).is_ok());
        assert!(check_media_type("media", &MediaUpload::new(vec![1], "text/plain")).is_err());
    }
}
