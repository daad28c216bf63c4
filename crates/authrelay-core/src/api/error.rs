use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::{RefreshError, StoreError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired: {0}")]
    Unauthorized(String),

    /// The request was retried with refreshed credentials and the server
    /// still refused it.
    #[error("Unauthorized even after refreshing credentials: {0}")]
    UnauthorizedAfterRetry(String),

    /// The request came back unauthorized and the credentials could not be
    /// renewed.
    #[error("Unauthorized and token refresh failed ({source}): {message}")]
    RefreshFailed {
        message: String,
        #[source]
        source: RefreshError,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {message}")]
    ServerError { status: StatusCode, message: String },

    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus { status: StatusCode, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the human-readable message out of an error body.
    /// The API replies with `{"code": 401, "message": "..."}`; anything else
    /// is used verbatim.
    fn server_message_from(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.to_string())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::truncate_body(&Self::server_message_from(body));
        match status.as_u16() {
            400 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError { status, message },
            _ => ApiError::UnexpectedStatus { status, message },
        }
    }

    /// HTTP status behind this error, when there was a server reply.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::AccessDenied(_) => Some(StatusCode::FORBIDDEN),
            ApiError::Unauthorized(_)
            | ApiError::UnauthorizedAfterRetry(_)
            | ApiError::RefreshFailed { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::BadRequest(_) => Some(StatusCode::BAD_REQUEST),
            ApiError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            ApiError::RateLimited => Some(StatusCode::TOO_MANY_REQUESTS),
            ApiError::ServerError { status, .. } | ApiError::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            ApiError::NetworkError(e) => e.status(),
            ApiError::InvalidResponse(_) | ApiError::InvalidRequest(_) | ApiError::Storage(_) => {
                None
            }
        }
    }

    /// Message the server sent along with an error status.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::AccessDenied(m)
            | ApiError::Unauthorized(m)
            | ApiError::UnauthorizedAfterRetry(m)
            | ApiError::BadRequest(m)
            | ApiError::NotFound(m)
            | ApiError::RefreshFailed { message: m, .. }
            | ApiError::ServerError { message: m, .. }
            | ApiError::UnexpectedStatus { message: m, .. } => Some(m),
            _ => None,
        }
    }

    /// A fresh authentication failure that a credential refresh may fix.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_categories() {
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "no"),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        let err = ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, "down");
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!err.is_unauthorized());
        assert_eq!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, "").status(),
            Some(StatusCode::IM_A_TEAPOT)
        );
    }

    #[test]
    fn test_server_message_is_extracted_from_json_body() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"code":401,"message":"Please authenticate"}"#,
        );
        assert_eq!(err.server_message(), Some("Please authenticate"));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "é".repeat(400);
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, &body);
        let message = err.server_message().unwrap();
        assert!(message.contains("truncated, 800 total bytes"));
    }
}
