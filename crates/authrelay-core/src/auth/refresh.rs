//! Token refresh with request deduplication.
//!
//! Many requests can hit a 401 at once when an access token lapses. The
//! coordinator collapses all of them onto a single `auth/refresh-tokens`
//! call: the first caller starts the refresh and parks its shared result in a
//! one-slot cache stamped with the start time; anyone arriving within the
//! cooldown window gets that same result, whether it is still pending,
//! succeeded or failed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::{Clock, RefreshError, Session, Token, TokenStore};
use crate::api::{Dispatch, UnauthenticatedClient};
use crate::models::{RefreshResponse, RefreshTokenBody};

/// Minimum interval between two real refresh calls.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_millis(20_000);

const REFRESH_PATH: &str = "auth/refresh-tokens";

type SharedRefresh = Shared<BoxFuture<'static, Result<Session, RefreshError>>>;

struct RefreshAttempt {
    result: SharedRefresh,
    created_at: DateTime<Utc>,
}

pub struct RefreshCoordinator {
    client: UnauthenticatedClient,
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
    cooldown: chrono::Duration,
    clear_on_rejection: bool,
    // One session, one slot.
    last_attempt: Mutex<Option<RefreshAttempt>>,
}

impl RefreshCoordinator {
    pub fn new(client: UnauthenticatedClient, store: Arc<TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            store,
            clock,
            cooldown: chrono::Duration::milliseconds(DEFAULT_REFRESH_COOLDOWN.as_millis() as i64),
            clear_on_rejection: true,
            last_attempt: Mutex::new(None),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown =
            chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::MAX);
        self
    }

    /// Whether an unrecoverable refresh failure wipes the stored session.
    pub fn clear_session_on_rejection(mut self, clear: bool) -> Self {
        self.clear_on_rejection = clear;
        self
    }

    pub fn cooldown(&self) -> chrono::Duration {
        self.cooldown
    }

    /// Obtain a renewed session, sharing the outcome with every caller inside
    /// the cooldown window.
    ///
    /// When no refresh token is held the call fails with
    /// [`RefreshError::NoRefreshToken`] and, unless clearing was disabled with
    /// [`clear_session_on_rejection`](Self::clear_session_on_rejection), the
    /// whole stored session is cleared, `user` included.
    ///
    /// The stored tokens are only replaced, or cleared on rejection, while
    /// the refresh token this attempt started from is still the stored one.
    /// A login or logout that lands mid-refresh therefore wins.
    pub async fn refresh(&self) -> Result<Session, RefreshError> {
        let Some(refresh_token) = self.store.get_refresh()? else {
            debug!("No refresh token held; not contacting the server");
            if self.clear_on_rejection {
                self.clear_session();
            }
            return Err(RefreshError::NoRefreshToken);
        };

        self.attempt(refresh_token).await
    }

    /// Forget the cached attempt so the next refresh goes to the network.
    /// Called whenever a new session is established or torn down.
    pub fn reset(&self) {
        self.slot().take();
    }

    fn attempt(&self, refresh_token: Token) -> SharedRefresh {
        let now = self.clock.now();
        let mut slot = self.slot();

        if let Some(attempt) = slot.as_ref() {
            if now - attempt.created_at < self.cooldown {
                debug!(started = %attempt.created_at, "Joining recent refresh attempt");
                return attempt.result.clone();
            }
        }

        // Detached so the refresh completes and updates the store even if
        // every caller stops waiting for it.
        let task = tokio::spawn(exchange(
            self.client.clone(),
            self.store.clone(),
            self.clock.clone(),
            refresh_token,
            self.clear_on_rejection,
        ));
        let result = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(RefreshError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        *slot = Some(RefreshAttempt {
            result: result.clone(),
            created_at: now,
        });
        result
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<RefreshAttempt>> {
        self.last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_session(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear session");
        }
    }
}

async fn exchange(
    client: UnauthenticatedClient,
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
    refresh_token: Token,
    clear_on_rejection: bool,
) -> Result<Session, RefreshError> {
    debug!("Refreshing access token");
    let body = RefreshTokenBody {
        refresh_token: refresh_token.value(),
    };

    let response: RefreshResponse = match client.post(REFRESH_PATH, &body).await {
        Ok(response) => response,
        Err(e) => {
            let err = RefreshError::from(e);
            warn!(error = %err, "Token refresh failed");
            if clear_on_rejection && err.is_unrecoverable() {
                match store.clear_if_current(&refresh_token) {
                    Ok(true) => info!("Refresh token rejected; session cleared"),
                    Ok(false) => debug!("Rejected refresh token already replaced; keeping session"),
                    Err(e) => warn!(error = %e, "Failed to clear session"),
                }
            }
            return Err(err);
        }
    };

    let tokens = response
        .tokens
        .ok_or_else(|| {
            RefreshError::InvalidResponse("refresh response carried no tokens".to_string())
        })?
        .stamp(clock.now())
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

    if !store.replace_tokens(&refresh_token, &tokens)? {
        // Logged in or out while the call was in flight; the newer state stands.
        let session = store.session()?;
        if session.access_token.is_none() {
            info!("Discarding refreshed tokens for a session that was logged out");
            return Err(RefreshError::Superseded);
        }
        debug!("Discarding refreshed tokens for a replaced session");
        return Ok(session);
    }

    info!(expires_at = %tokens.access.expires_at(), "Access token refreshed");
    Ok(store.session()?)
}
