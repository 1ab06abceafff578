use std::borrow::Cow;

use thiserror::Error;

use crate::collaborators::MediaError;

/// Error type returned by the storage layer.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Validation failed for one or more fields.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Target document was not found when performing a mutation.
    #[error("document not found")]
    NotFound { entity_id: Option<String> },

    /// Invalid input supplied to a repository operation.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Unique constraint violation - the value already belongs to another document.
    #[error("unique constraint violation: fields {fields:?} already claimed by '{existing_entity_id}'")]
    UniqueConstraintViolation {
        fields: Vec<String>,
        existing_entity_id: String,
    },

    /// A document failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

/// Collection of validation issues encountered while preparing an operation.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// First human-readable message, used for the `message` of error envelopes.
    pub fn summary(&self) -> String {
        self.issues
            .first()
            .map(|issue| format!("{}: {}", issue.field, issue.message))
            .unwrap_or_else(|| "validation failed".to_string())
    }
}

/// Detailed validation failure for a single field or logical path.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Accumulates issues and converts to `Err` only when something was recorded.
#[derive(Debug, Default)]
pub struct Validator {
    issues: Vec<ValidationIssue>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, code: &str, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.issues.push(ValidationIssue::new(field, code, message));
        }
        self
    }

    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.chars().count();
        if len < min {
            self.issues.push(ValidationIssue::new(
                field,
                "validation.length",
                format!("length must be at least {min}"),
            ));
        } else if len > max {
            self.issues.push(ValidationIssue::new(
                field,
                "validation.length",
                format!("length must be at most {max}"),
            ));
        }
        self
    }

    pub fn finish(&mut self) -> ValidationResult<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(std::mem::take(&mut self.issues)))
        }
    }
}

/// Why a request could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnauthorizedKind {
    #[error("authentication required")]
    Missing,
    #[error("invalid token")]
    Invalid,
    /// The token was well-formed and signed but is past its expiry; clients may refresh.
    #[error("token expired")]
    Expired,
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// Error type returned by every service operation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(UnauthorizedKind),

    #[error("{}", .0.summary())]
    Validation(#[from] ValidationError),

    #[error("media error: {0}")]
    Media(#[from] MediaError),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::single(field, "validation.invalid", message))
    }

    /// Conventional HTTP status for the error envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::Media(_) | AppError::Unexpected(_) => 500,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { entity_id } => {
                AppError::NotFound(entity_id.map_or_else(|| "document".to_string(), |id| format!("document '{id}'")))
            }
            RepoError::UniqueConstraintViolation { fields, .. } => {
                AppError::Conflict(format!("{} already taken", fields.join(", ")))
            }
            RepoError::Validation(validation) => AppError::Validation(validation),
            other => AppError::Unexpected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_collects_every_issue() {
        let err = Validator::new()
            .length("username", "ab", 3, 30)
            .check(false, "email", "validation.email", "value must be a valid email address")
            .finish()
            .unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert_eq!(err.issues[0].code, "validation.length");
        assert_eq!(err.summary(), "username: length must be at least 3");
    }

    #[test]
    fn repo_errors_map_to_service_errors() {
        let conflict: AppError = RepoError::UniqueConstraintViolation {
            fields: vec!["email".into()],
            existing_entity_id: "u1".into(),
        }
        .into();
        assert!(matches!(&conflict, AppError::Conflict(reason) if reason == "email already taken"));
        assert_eq!(conflict.status_code(), 409);

        let missing: AppError = RepoError::NotFound { entity_id: None }.into();
        assert_eq!(missing.status_code(), 404);
        assert_eq!(AppError::Unauthorized(UnauthorizedKind::Expired).status_code(), 401);
    }

    #[test]
    fn validator_passes_clean_input() {
        assert!(Validator::new().length("caption", "hello", 0, 10).finish().is_ok());
    }
}
