use serde::{Deserialize, Serialize};

use super::Token;
use crate::models::User;

/// Snapshot of everything the [`TokenStore`](super::TokenStore) holds.
///
/// The store is the only owner of session state; values of this type are
/// read-only copies handed out to callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<Token>,
    pub refresh_token: Option<Token>,
}

impl Session {
    /// Get the bearer token if one is held
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_ref().map(Token::value)
    }

    /// Get the user ID if a user is logged in
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// An access token is never held without a way to renew it.
    pub fn is_consistent(&self) -> bool {
        self.access_token.is_none() || self.refresh_token.is_some()
    }
}
