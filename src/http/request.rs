//! Request-scoped state.
//!
//! # Responsibilities
//! - Carry the caller's token from the auth gate to the dispatcher
//! - Carry the request span and request ID of the inbound request
//!
//! # Design Decisions
//! - Typed context stored in request extensions; no string-keyed lookups
//! - The token is optional: login runs without one

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::Span;

use crate::http::response::GatewayError;

/// Header the caller's token is read from.
pub const TOKEN_HEADER: &str = "token";

pub const X_REQUEST_ID: &str = "x-request-id";

/// State the auth gate hands to the dispatcher for one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    token: Option<String>,
    span: Span,
    request_id: Option<String>,
}

impl RequestContext {
    pub fn new(token: Option<String>, span: Span, request_id: Option<String>) -> Self {
        Self {
            token,
            span,
            request_id,
        }
    }

    /// The caller's token, if the route required one.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The inbound request span; backend calls are opened beneath it.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only the auth gate inserts the context; a route outside it is unauthenticated.
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or(GatewayError::Unauthenticated)
    }
}
