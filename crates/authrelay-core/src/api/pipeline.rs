//! Ordered request/response middleware around a [`Transport`](super::Transport).
//!
//! Request middleware rewrites the outgoing descriptor and cannot fail.
//! Response middleware inspects the outcome and either settles it or asks
//! for the request to be sent again.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ApiError, ApiRequest, ApiResponse};

/// A failed exchange together with the request that produced it, when known.
/// Without the request there is nothing to resend.
#[derive(Debug)]
pub struct Failure {
    pub error: ApiError,
    pub request: Option<ApiRequest>,
}

impl Failure {
    pub fn new(error: ApiError, request: Option<ApiRequest>) -> Self {
        Self { error, request }
    }
}

pub type Outcome = Result<ApiResponse, Failure>;

#[derive(Debug)]
pub enum ResponseAction {
    /// Hand this outcome to the next middleware, or to the caller.
    Resolve(Outcome),
    /// Send this request through the whole pipeline again.
    Retry(ApiRequest),
}

pub trait RequestMiddleware: Send + Sync {
    fn on_request(&self, request: ApiRequest) -> ApiRequest;
}

#[async_trait]
pub trait ResponseMiddleware: Send + Sync {
    async fn on_response(&self, outcome: Outcome) -> ResponseAction;
}

#[derive(Clone, Default)]
pub struct Pipeline {
    request: Vec<Arc<dyn RequestMiddleware>>,
    response: Vec<Arc<dyn ResponseMiddleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, middleware: impl RequestMiddleware + 'static) -> Self {
        self.request.push(Arc::new(middleware));
        self
    }

    pub fn with_response(mut self, middleware: impl ResponseMiddleware + 'static) -> Self {
        self.response.push(Arc::new(middleware));
        self
    }

    /// Run request middleware in registration order.
    pub fn prepare(&self, request: ApiRequest) -> ApiRequest {
        self.request
            .iter()
            .fold(request, |request, middleware| middleware.on_request(request))
    }

    /// Run response middleware in registration order, stopping at the first
    /// that asks for a retry.
    pub async fn settle(&self, outcome: Outcome) -> ResponseAction {
        let mut outcome = outcome;
        for middleware in &self.response {
            match middleware.on_response(outcome).await {
                ResponseAction::Resolve(next) => outcome = next,
                retry @ ResponseAction::Retry(_) => return retry,
            }
        }
        ResponseAction::Resolve(outcome)
    }
}
