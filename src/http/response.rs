//! Response envelope and error taxonomy.
//!
//! # Responsibilities
//! - Define the `{code, msg, data?}` envelope every endpoint answers with
//! - Classify every way a request can fail
//! - Map (success value | error) to (HTTP status, envelope)
//!
//! # Design Decisions
//! - Logical failures are HTTP 200 with `code = 0`; only route-not-found (404)
//!   and a missing token (401) change the HTTP status
//! - Backend failures surface the backend's message text, never its code
//! - Transport failures keep the underlying transport error text
//! - Layer failures (body limit, method, timeout) use the same envelope

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::dispatch::validate::Rejection;
use crate::net::TransportError;
use crate::rpc::Status;

/// `msg` of every successful envelope.
pub const SUCCESS_MESSAGE: &str = "success";

/// Envelope `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Failure,
    Success,
}

impl Serialize for ResultCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            ResultCode::Failure => 0,
            ResultCode::Success => 1,
        })
    }
}

/// The uniform wrapper returned for every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub code: ResultCode,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn success(data: Option<Value>) -> Self {
        Self {
            code: ResultCode::Success,
            msg: SUCCESS_MESSAGE.to_string(),
            data,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            code: ResultCode::Failure,
            msg: msg.into(),
            data: None,
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Every way a request can fail before producing a success envelope.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The path has no usable terminal segment or matches no route.
    #[error("route not found")]
    RouteNotFound,

    /// A protected route was called without a `Token` header.
    #[error("please log in")]
    Unauthenticated,

    /// The body is not valid JSON for the operation.
    #[error("{0}")]
    Decode(String),

    /// A field is out of range.
    #[error("{0}")]
    Validation(#[from] Rejection),

    /// No connection to the backend could be established.
    #[error("backend unavailable: {0}")]
    Transport(#[from] TransportError),

    /// The backend answered with a failure status.
    #[error("{}", .0.message())]
    Backend(#[from] Status),

    /// The backend's answer could not be turned into response data.
    #[error("encode response: {0}")]
    Encode(#[from] serde_json::Error),

    /// The request outlived the gateway's request timeout.
    #[error("request timed out")]
    Timeout,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound => StatusCode::NOT_FOUND,
            GatewayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            _ => StatusCode::OK,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound => "not_found",
            GatewayError::Unauthenticated => "unauthenticated",
            GatewayError::Decode(_) => "decode",
            GatewayError::Validation(_) => "validation",
            GatewayError::Transport(_) => "transport",
            GatewayError::Backend(_) => "backend",
            GatewayError::Encode(_) => "encode",
            GatewayError::Timeout => "timeout",
        }
    }
}

/// Map the outcome of a request to its HTTP status and envelope.
pub fn build_envelope(result: Result<Option<Value>, GatewayError>) -> (StatusCode, Envelope) {
    match result {
        Ok(data) => (StatusCode::OK, Envelope::success(data)),
        Err(err) => (err.status_code(), Envelope::failure(err.to_string())),
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, envelope) = build_envelope(Err(self));
        (status, Json(envelope)).into_response()
    }
}
