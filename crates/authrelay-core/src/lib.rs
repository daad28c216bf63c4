//! authrelay - client-side HTTP access with transparent token refresh.
//!
//! Requests sent through an [`AuthenticatedClient`] carry the stored access
//! token. When the server answers 401 the client refreshes the token pair
//! once, shared between every request that failed at the same time, and
//! resends the original request. Callers only see the final outcome.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use authrelay_core::{ClientConfig, Clients, Dispatch, TokenStore};
//!
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(TokenStore::in_memory());
//! let clients = Clients::new(&config, store)?;
//!
//! clients.auth().login("scout@example.com", "password1").await?;
//! let me: serde_json::Value = clients.private().get("users/me").await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{
    ApiError, ApiRequest, ApiResponse, AuthenticatedClient, Clients, Dispatch, HttpTransport,
    Transport, UnauthenticatedClient,
};
pub use auth::{
    AuthService, Clock, ExpiryPolicy, FileStorage, KeyringStorage, ManualClock, MemoryStorage,
    RefreshCoordinator, RefreshError, Session, Storage, StoreError, SystemClock, Token, TokenPair,
    TokenStore,
};
pub use config::ClientConfig;
pub use models::{NewUser, User};
