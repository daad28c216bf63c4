use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token issued at {issued_at} expires earlier, at {expires_at}")]
    IssuedAfterExpiry {
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
}

/// An opaque bearer credential with its validity window.
///
/// Tokens are immutable: a refresh replaces the whole value rather than
/// touching fields in place. This is the persisted form; tokens arriving
/// from the server come in as [`WireToken`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredToken")]
pub struct Token {
    #[serde(rename = "token")]
    value: String,
    #[serde(rename = "issuedAt")]
    issued_at: DateTime<Utc>,
    #[serde(rename = "expires")]
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct StoredToken {
    token: String,
    #[serde(rename = "issuedAt")]
    issued_at: DateTime<Utc>,
    expires: DateTime<Utc>,
}

impl TryFrom<StoredToken> for Token {
    type Error = TokenError;

    fn try_from(stored: StoredToken) -> Result<Self, Self::Error> {
        Token::new(stored.token, stored.issued_at, stored.expires)
    }
}

/// Token shape as issued by the auth server. `issuedAt` is optional there.
#[derive(Clone, Deserialize)]
pub struct WireToken {
    token: String,
    expires: DateTime<Utc>,
    #[serde(rename = "issuedAt")]
    issued_at: Option<DateTime<Utc>>,
}

impl WireToken {
    /// Turn into a [`Token`], taking a missing issue time as `now` (or the
    /// expiry, if that is earlier).
    pub fn stamp(self, now: DateTime<Utc>) -> Result<Token, TokenError> {
        let issued_at = self.issued_at.unwrap_or_else(|| now.min(self.expires));
        Token::new(self.token, issued_at, self.expires)
    }
}

impl fmt::Debug for WireToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireToken")
            .field("token", &"<redacted>")
            .field("expires", &self.expires)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

impl Token {
    pub fn new(
        value: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        if issued_at > expires_at {
            return Err(TokenError::IssuedAfterExpiry {
                issued_at,
                expires_at,
            });
        }
        Ok(Self {
            value: value.into(),
            issued_at,
            expires_at,
        })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

// Keep credentials out of logs and panic messages.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: Token,
    pub refresh: Token,
}

/// Access/refresh pair as returned by the login and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct WireTokenPair {
    pub access: WireToken,
    pub refresh: WireToken,
}

impl WireTokenPair {
    pub fn stamp(self, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.access.stamp(now)?,
            refresh: self.refresh.stamp(now)?,
        })
    }
}
