//! HTTP access layer for the REST API.
//!
//! This module provides the request descriptor, the transport abstraction,
//! the middleware pipeline and the two client entry points built on them.
//!
//! Authenticated requests carry a short-lived JWT bearer token that is
//! renewed transparently through [`crate::auth::RefreshCoordinator`].

pub mod client;
pub mod error;
pub mod pipeline;
pub mod request;
pub mod transport;

pub use client::{AuthenticatedClient, Clients, Dispatch, UnauthenticatedClient};
pub use error::ApiError;
pub use pipeline::{Failure, Outcome, Pipeline, RequestMiddleware, ResponseAction, ResponseMiddleware};
pub use request::ApiRequest;
pub use transport::{ApiResponse, HttpTransport, Transport, DEFAULT_REQUEST_TIMEOUT};
