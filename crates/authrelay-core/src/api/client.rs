//! Request-dispatch entry points.
//!
//! [`UnauthenticatedClient`] talks to public endpoints and never touches
//! credentials. [`AuthenticatedClient`] runs every request through the auth
//! pipeline: bearer token on the way out, one refresh-and-retry on a 401 on
//! the way back. Both share one transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::pipeline::{Failure, Pipeline, ResponseAction};
use super::{ApiError, ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::auth::{
    AuthService, BearerAuth, Clock, ExpiryPolicy, RefreshCoordinator, RefreshOnUnauthorized,
    SystemClock, TokenStore,
};
use crate::config::ClientConfig;

/// Typed JSON helpers over a client's `send`.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;

    async fn get<T>(&self, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send,
    {
        self.send(ApiRequest::get(path)).await?.json()
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync + ?Sized,
    {
        let request = ApiRequest::post(path).json(body)?;
        self.send(request).await?.json()
    }

    async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync + ?Sized,
    {
        let request = ApiRequest::patch(path).json(body)?;
        self.send(request).await?.json()
    }

    /// DELETE, ignoring any response body
    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await.map(|_| ())
    }
}

/// Client for public endpoints (login, refresh, registration).
/// Clone is cheap - the transport is shared.
#[derive(Clone)]
pub struct UnauthenticatedClient {
    transport: Arc<dyn Transport>,
}

impl UnauthenticatedClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Dispatch for UnauthenticatedClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.transport.send(&request).await
    }
}

/// Client for endpoints that need a bearer token.
#[derive(Clone)]
pub struct AuthenticatedClient {
    transport: Arc<dyn Transport>,
    pipeline: Pipeline,
}

impl AuthenticatedClient {
    /// Wire the standard auth pipeline around `transport`.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        let pipeline = Pipeline::new()
            .with_request(BearerAuth::new(store))
            .with_response(RefreshOnUnauthorized::new(coordinator));
        Self::with_pipeline(transport, pipeline)
    }

    pub fn with_pipeline(transport: Arc<dyn Transport>, pipeline: Pipeline) -> Self {
        Self {
            transport,
            pipeline,
        }
    }
}

#[async_trait]
impl Dispatch for AuthenticatedClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut request = request;
        loop {
            // Middleware sees the caller's descriptor on every pass, so a
            // resend picks up whatever token is current by then.
            let prepared = self.pipeline.prepare(request.clone());
            debug!(
                method = %prepared.method(),
                path = prepared.path(),
                retry = prepared.is_retry(),
                "Dispatching authenticated request"
            );

            let outcome = self
                .transport
                .send(&prepared)
                .await
                .map_err(|error| Failure::new(error, Some(request)));

            match self.pipeline.settle(outcome).await {
                ResponseAction::Resolve(result) => return result.map_err(|f| f.error),
                ResponseAction::Retry(next) => request = next,
            }
        }
    }
}

/// Everything a process needs to talk to the API, built around one
/// transport and one token store.
#[derive(Clone)]
pub struct Clients {
    public: UnauthenticatedClient,
    private: AuthenticatedClient,
    coordinator: Arc<RefreshCoordinator>,
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
}

impl Clients {
    pub fn new(config: &ClientConfig, store: Arc<TokenStore>) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config.base_url.clone(), config.request_timeout)?;
        Ok(Self::from_transport(
            Arc::new(transport),
            store,
            Arc::new(SystemClock),
            config,
        ))
    }

    /// Wire the clients over an arbitrary transport and clock.
    pub fn from_transport(
        transport: Arc<dyn Transport>,
        store: Arc<TokenStore>,
        clock: Arc<dyn Clock>,
        config: &ClientConfig,
    ) -> Self {
        let public = UnauthenticatedClient::new(transport.clone());
        let coordinator = Arc::new(
            RefreshCoordinator::new(public.clone(), store.clone(), clock.clone())
                .with_cooldown(config.refresh_cooldown)
                .clear_session_on_rejection(config.clear_session_on_refresh_rejection),
        );
        let private = AuthenticatedClient::new(transport, store.clone(), coordinator.clone());

        Self {
            public,
            private,
            coordinator,
            store,
            clock,
        }
    }

    pub fn public(&self) -> &UnauthenticatedClient {
        &self.public
    }

    pub fn private(&self) -> &AuthenticatedClient {
        &self.private
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn expiry(&self) -> ExpiryPolicy {
        ExpiryPolicy::new(self.clock.clone())
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(
            self.public.clone(),
            self.private.clone(),
            self.store.clone(),
            self.coordinator.clone(),
            self.expiry(),
        )
    }
}
