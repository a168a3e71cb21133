//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext + JSON body
//!     → Parse    (serde into the operation's params; zero values for missing fields)
//!     → Validate (operation rules, fixed messages)
//!     → Acquire  (context.rs: budgets + span; net: bounded connect with credentials)
//!     → Invoke   (rpc: one unary call under the call budget)
//!     → Respond  (operation shapes the payload; http::response builds the envelope)
//! ```
//!
//! # Design Decisions
//! - One generic template; every operation in operations.rs only declares
//!   its params, rules, backend method and payload
//! - Parse and validation failures never touch the backend
//! - Every failure is terminal for the request; nothing is retried
//! - The connection is owned by the call and dropped on every exit path

pub mod context;
pub mod operations;
pub mod validate;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Instant;
use tracing::Instrument;

use crate::config::TimeoutConfig;
use crate::http::request::RequestContext;
use crate::http::response::{build_envelope, GatewayError};
use crate::http::server::AppState;
use crate::net::ConnectionFactory;
use crate::observability::metrics::record_request;
use crate::observability::tracing::record_error;
use crate::rpc::{AccountClient, CallOptions, Status};

pub use context::CallContext;
pub use operations::{ChangePassword, CreateAccount, DeleteAccount, ListAccounts, Login, RenameAccount};
pub use validate::Rejection;

/// One account operation, as plugged into the dispatch template.
pub trait Operation: Send + Sync + 'static {
    /// Label used in logs and metrics.
    const NAME: &'static str;
    /// Backend method invoked.
    const METHOD: &'static str;

    /// Decoded inbound body.
    type Params: DeserializeOwned + Send;
    type Request: Send + Sync;
    type Response: Send;

    fn validate(params: &Self::Params) -> Result<(), Rejection>;

    fn request(params: Self::Params) -> Self::Request;

    fn invoke<'a>(
        client: &'a mut AccountClient,
        request: &'a Self::Request,
        opts: &'a CallOptions,
    ) -> BoxFuture<'a, Result<Self::Response, Status>>;

    /// Envelope `data` for a successful call.
    fn respond(response: Self::Response) -> serde_json::Result<Option<Value>>;
}

/// Run parse → validate → acquire → invoke → respond for one request.
pub async fn dispatch<O: Operation>(
    connections: &ConnectionFactory,
    timeouts: &TimeoutConfig,
    ctx: &RequestContext,
    body: &[u8],
) -> Result<Option<Value>, GatewayError> {
    let params: O::Params =
        serde_json::from_slice(body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    O::validate(&params)?;
    let request = O::request(params);

    let call = CallContext::new(ctx, timeouts, O::METHOD);
    let result = call_backend::<O>(connections, &call, &request)
        .instrument(call.span().clone())
        .await;

    if let Err(e) = &result {
        record_error(call.span(), e);
        tracing::warn!(parent: call.span(), operation = O::NAME, kind = e.kind(), error = %e, "Backend call failed");
    }
    Ok(O::respond(result?)?)
}

async fn call_backend<O: Operation>(
    connections: &ConnectionFactory,
    call: &CallContext,
    request: &O::Request,
) -> Result<O::Response, GatewayError> {
    let conn = connections
        .connect_within(call.credentials(), call.connect_deadline())
        .await?;
    let mut client = AccountClient::new(conn);
    let opts = call.options();
    let response = O::invoke(&mut client, request, &opts).await?;
    Ok(response)
}

/// Axum handler instantiating the template for `O`.
pub async fn handle<O: Operation>(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();
    let result = match body {
        Ok(body) => dispatch::<O>(&state.connections, &state.config.timeouts, &ctx, &body).await,
        Err(rejection) => Err(GatewayError::Decode(rejection.body_text())),
    };

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => {
            tracing::info!(operation = O::NAME, kind = e.kind(), error = %e, "Request failed");
            e.kind()
        }
    };
    record_request(O::NAME, outcome, start);

    let (status, envelope) = build_envelope(result);
    (status, Json(envelope)).into_response()
}
