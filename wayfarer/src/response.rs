use serde::Serialize;

use crate::errors::{AppError, UnauthorizedKind};

/// Success envelope: `{ "success": true, ...payload }`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            message: None,
            payload,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Failure envelope: `{ "success": false, "message": ..., ("tokenExpired" | "requiresAuth") }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: u16,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_auth: Option<bool>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let (token_expired, requires_auth) = match err {
            AppError::Unauthorized(UnauthorizedKind::Expired) => (Some(true), None),
            AppError::Unauthorized(UnauthorizedKind::Missing | UnauthorizedKind::Invalid) => (None, Some(true)),
            _ => (None, None),
        };
        let message = match err {
            AppError::Validation(validation) => validation.summary(),
            AppError::Unexpected(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        Self {
            status: err.status_code(),
            success: false,
            message,
            token_expired,
            requires_auth,
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::errors::ValidationError;

    #[derive(Serialize)]
    struct Counts {
        #[serde(rename = "unreadCount")]
        unread_count: u64,
    }

    #[test]
    fn success_flattens_payload() {
        let body = serde_json::to_value(ApiResponse::ok(Counts { unread_count: 3 })).unwrap();
        assert_eq!(body, json!({ "success": true, "unreadCount": 3 }));

        let body = serde_json::to_value(ApiResponse::ok(json!({})).with_message("Logged out")).unwrap();
        assert_eq!(body, json!({ "success": true, "message": "Logged out" }));
    }

    #[test]
    fn expired_tokens_are_flagged() {
        let response = ErrorResponse::from(AppError::Unauthorized(UnauthorizedKind::Expired));
        assert_eq!(response.status, 401);
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["tokenExpired"], json!(true));
        assert!(body.get("requiresAuth").is_none());
    }

    #[test]
    fn invalid_tokens_require_auth() {
        let body = serde_json::to_value(ErrorResponse::from(AppError::Unauthorized(UnauthorizedKind::Invalid))).unwrap();
        assert_eq!(body["requiresAuth"], json!(true));
        assert_eq!(body["success"], json!(false));
    }

    #[test]
    fn unexpected_errors_hide_details() {
        let response = ErrorResponse::from(AppError::Unexpected("redis exploded".into()));
        assert_eq!(response.status, 500);
        assert_eq!(response.message, "internal server error");

        let response = ErrorResponse::from(AppError::Validation(ValidationError::single(
            "text",
            "validation.required",
            "text is required",
        )));
        assert_eq!(response.status, 400);
        assert_eq!(response.message, "text: text is required");
    }
}
