//! Data models exchanged with the auth server.
//!
//! Token types live in [`crate::auth`]; this module holds the user identity
//! and the request/response envelopes of the `auth/*` endpoints.

pub mod user;

pub use user::{NewUser, User};

use serde::{Deserialize, Serialize};

use crate::auth::WireTokenPair;

/// Body of `auth/login` and `auth/register` responses.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(default)]
    pub tokens: Option<WireTokenPair>,
}

/// Body of `auth/refresh-tokens` responses.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub tokens: Option<WireTokenPair>,
}

/// Body sent to `auth/refresh-tokens` and `auth/logout`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBody<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}
