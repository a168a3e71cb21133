//! Backend call context.
//!
//! Built once per dispatched operation and dropped when the call returns.
//! Holds the two independent budgets, the client span and the caller's
//! token, so nothing about the call is read from shared state.

use std::sync::Arc;
use std::time::Duration;
use tracing::Span;

use crate::config::TimeoutConfig;
use crate::http::request::RequestContext;
use crate::observability::tracing::client_span;
use crate::rpc::{CallOptions, PerRpcCredentials, TokenCredentials, SERVICE};

#[derive(Debug)]
pub struct CallContext {
    token: String,
    connect_deadline: Duration,
    call_deadline: Duration,
    request_id: Option<String>,
    span: Span,
}

impl CallContext {
    /// Derive the call context for `method` from the inbound request.
    pub fn new(request: &RequestContext, timeouts: &TimeoutConfig, method: &str) -> Self {
        Self {
            token: request.token().unwrap_or_default().to_string(),
            connect_deadline: timeouts.connect(),
            call_deadline: timeouts.call(),
            request_id: request.request_id().map(str::to_string),
            span: client_span(SERVICE, method, request.span()),
        }
    }

    pub fn credentials(&self) -> Arc<dyn PerRpcCredentials> {
        Arc::new(TokenCredentials::new(self.token.clone()))
    }

    pub fn connect_deadline(&self) -> Duration {
        self.connect_deadline
    }

    /// Options for the outbound call; its trace context names the client span.
    pub fn options(&self) -> CallOptions {
        CallOptions {
            deadline: self.call_deadline,
            span: self.span.clone(),
            request_id: self.request_id.clone(),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
