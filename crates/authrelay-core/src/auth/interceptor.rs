//! The two halves of the authenticated pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{RefreshCoordinator, TokenStore};
use crate::api::{
    ApiError, ApiRequest, Failure, Outcome, RequestMiddleware, ResponseAction, ResponseMiddleware,
};

/// Attaches the stored access token as a bearer credential.
///
/// A missing token is not an error here; the server decides whether the
/// request needed one.
pub struct BearerAuth {
    store: Arc<TokenStore>,
}

impl BearerAuth {
    pub fn new(store: Arc<TokenStore>) -> Self {
        Self { store }
    }
}

impl RequestMiddleware for BearerAuth {
    fn on_request(&self, mut request: ApiRequest) -> ApiRequest {
        match self.store.get_access() {
            Ok(Some(token)) => {
                if let Err(e) = request.set_bearer(token.value()) {
                    warn!(error = %e, "Stored access token is not a valid header value");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Could not read access token; sending request without it");
            }
        }
        request
    }
}

/// Turns a first 401 into refresh-then-resend.
///
/// A request is resent at most once: the retry marker set here is what stops
/// a server that keeps answering 401 from looping forever.
pub struct RefreshOnUnauthorized {
    coordinator: Arc<RefreshCoordinator>,
}

impl RefreshOnUnauthorized {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ResponseMiddleware for RefreshOnUnauthorized {
    async fn on_response(&self, outcome: Outcome) -> ResponseAction {
        let failure = match outcome {
            Err(failure) if failure.error.is_unauthorized() => failure,
            other => return ResponseAction::Resolve(other),
        };

        let Failure { error, request } = failure;
        let Some(mut request) = request else {
            debug!("Unauthorized response without its request; cannot retry");
            return ResponseAction::Resolve(Err(Failure::new(error, None)));
        };

        let message = error.server_message().unwrap_or_default().to_string();

        if request.is_retry() {
            warn!(path = request.path(), "Still unauthorized after refreshing credentials");
            return ResponseAction::Resolve(Err(Failure::new(
                ApiError::UnauthorizedAfterRetry(message),
                Some(request),
            )));
        }

        match self.coordinator.refresh().await {
            Ok(_) => {
                debug!(path = request.path(), "Credentials refreshed; resending request");
                request.mark_retried();
                ResponseAction::Retry(request)
            }
            Err(source) => ResponseAction::Resolve(Err(Failure::new(
                ApiError::RefreshFailed { message, source },
                Some(request),
            ))),
        }
    }
}
