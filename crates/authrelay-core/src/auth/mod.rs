//! Authentication module for managing session credentials.
//!
//! This module provides:
//! - `TokenStore`: the single owner of access/refresh tokens and the user
//! - `ExpiryPolicy`: token validity checks against an injectable `Clock`
//! - `RefreshCoordinator`: deduplicated token refresh
//! - `BearerAuth` / `RefreshOnUnauthorized`: the authenticated pipeline
//! - `AuthService`: login, logout and account operations
//!
//! Access tokens are short-lived; a 401 triggers one refresh and one resend.

pub mod clock;
pub mod error;
pub mod expiry;
pub mod interceptor;
pub mod refresh;
pub mod service;
pub mod session;
pub mod storage;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{RefreshError, StoreError};
pub use expiry::{is_valid_at, ExpiryPolicy};
pub use interceptor::{BearerAuth, RefreshOnUnauthorized};
pub use refresh::{RefreshCoordinator, DEFAULT_REFRESH_COOLDOWN};
pub use service::AuthService;
pub use session::Session;
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, Storage};
pub use store::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
pub use token::{Token, TokenError, TokenPair, WireToken, WireTokenPair};
