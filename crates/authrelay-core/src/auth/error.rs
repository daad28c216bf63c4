use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed stored value for '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Keychain error for '{key}': {source}")]
    Keychain {
        key: String,
        #[source]
        source: keyring::Error,
    },

    #[error("Refusing to store an access token without a refresh token")]
    AccessWithoutRefresh,
}

/// Outcome of a failed token refresh.
///
/// Cloneable because one refresh result is handed to every caller that
/// joined the same attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token available - please log in again")]
    NoRefreshToken,

    #[error("Refresh rejected by server (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Refresh request failed: {0}")]
    Transport(String),

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("Could not persist refreshed tokens: {0}")]
    Storage(String),

    #[error("Refresh task aborted: {0}")]
    Aborted(String),

    #[error("Session was logged out while the refresh was in flight")]
    Superseded,
}

impl RefreshError {
    /// Whether the session can no longer be renewed and should be dropped.
    pub fn is_unrecoverable(&self) -> bool {
        match self {
            RefreshError::NoRefreshToken => true,
            RefreshError::Rejected { status, .. } => matches!(status, 400 | 401 | 403),
            _ => false,
        }
    }
}

impl From<StoreError> for RefreshError {
    fn from(err: StoreError) -> Self {
        RefreshError::Storage(err.to_string())
    }
}

impl From<ApiError> for RefreshError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NetworkError(e) => RefreshError::Transport(e.to_string()),
            ApiError::InvalidResponse(msg) => RefreshError::InvalidResponse(msg),
            ApiError::Storage(e) => RefreshError::Storage(e.to_string()),
            other => match other.status() {
                Some(status) => RefreshError::Rejected {
                    status: status.as_u16(),
                    message: other.server_message().unwrap_or_default().to_string(),
                },
                None => RefreshError::Transport(other.to_string()),
            },
        }
    }
}
