use std::sync::Arc;

use tracing::{info, warn};

use super::{ExpiryPolicy, RefreshCoordinator, RefreshError, Session, StoreError, TokenStore};
use crate::api::{ApiError, ApiRequest, AuthenticatedClient, Dispatch, UnauthenticatedClient};
use crate::models::{AuthResponse, LoginBody, NewUser, RefreshTokenBody, User};

/// Session lifecycle and account operations against the `auth/*` endpoints.
#[derive(Clone)]
pub struct AuthService {
    public: UnauthenticatedClient,
    private: AuthenticatedClient,
    store: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    expiry: ExpiryPolicy,
}

impl AuthService {
    pub fn new(
        public: UnauthenticatedClient,
        private: AuthenticatedClient,
        store: Arc<TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
        expiry: ExpiryPolicy,
    ) -> Self {
        Self {
            public,
            private,
            store,
            coordinator,
            expiry,
        }
    }

    /// Log in and store the returned user and tokens
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let response: AuthResponse = self
            .public
            .post("auth/login", &LoginBody { email, password })
            .await?;
        let user = self.establish(response)?;
        info!(user_id = %user.id, "Logged in");
        Ok(user)
    }

    /// Log out the current user.
    ///
    /// The server is told to revoke the refresh token on a best-effort
    /// basis; the local session is cleared regardless of its answer.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Some(refresh_token) = self.store.get_refresh()? {
            let body = RefreshTokenBody {
                refresh_token: refresh_token.value(),
            };
            let request = ApiRequest::post("auth/logout").json(&body)?;
            if let Err(e) = self.public.send(request).await {
                warn!(error = %e, "Server-side logout failed; clearing local session anyway");
            }
        }

        self.store.clear()?;
        self.coordinator.reset();
        info!("Logged out");
        Ok(())
    }

    /// Register a new user. When the server returns tokens the new user is
    /// logged in straight away.
    pub async fn register(&self, new_user: &NewUser) -> Result<User, ApiError> {
        let response: AuthResponse = self.public.post("auth/register", new_user).await?;
        if response.tokens.is_none() {
            return Ok(response.user);
        }
        let user = self.establish(response)?;
        info!(user_id = %user.id, "Registered and logged in");
        Ok(user)
    }

    /// Send a password reset email to the given address
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let request =
            ApiRequest::post("auth/forgot-password").json(&serde_json::json!({ "email": email }))?;
        self.public.send(request).await.map(|_| ())
    }

    /// Reset a password using the token from the reset email
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("auth/reset-password")
            .query("token", token)
            .json(&serde_json::json!({ "password": new_password }))?;
        self.public.send(request).await.map(|_| ())
    }

    /// Ask the server to resend the verification email to the logged-in user
    pub async fn resend_email_verification(&self) -> Result<(), ApiError> {
        self.private
            .send(ApiRequest::post("auth/send-verification-email"))
            .await
            .map(|_| ())
    }

    /// Mark an email address verified using the token from the verification email
    pub async fn verify_email(&self, token: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("auth/verify-email").query("token", token);
        self.public.send(request).await.map(|_| ())
    }

    /// Renew the access token now, through the shared coordinator.
    pub async fn refresh_login(&self) -> Result<Session, RefreshError> {
        self.coordinator.refresh().await
    }

    pub fn current_user(&self) -> Result<Option<User>, StoreError> {
        self.store.get_user()
    }

    pub fn session(&self) -> Result<Session, StoreError> {
        self.store.session()
    }

    /// Whether a still-valid access token is held
    pub fn is_logged_in(&self) -> bool {
        match self.store.session() {
            Ok(session) => self.expiry.is_logged_in(&session),
            Err(e) => {
                warn!(error = %e, "Could not read session");
                false
            }
        }
    }

    // Tokens without an `issuedAt` are stamped with the policy's clock.
    fn establish(&self, response: AuthResponse) -> Result<User, ApiError> {
        let tokens = response
            .tokens
            .map(|wire| wire.stamp(self.expiry.now()))
            .transpose()
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        self.store.set_user(Some(&response.user))?;
        if let Some(ref tokens) = tokens {
            self.store.set_tokens(tokens)?;
        }
        self.coordinator.reset();
        Ok(response.user)
    }
}
