//! Authentication gate.
//! Single enforcement point for token presence; the backend judges validity.

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::http::request::{RequestContext, TOKEN_HEADER, X_REQUEST_ID};
use crate::http::response::GatewayError;
use crate::observability::tracing::RequestTrace;

/// Terminal path segment of the one operation that needs no token.
pub const LOGIN_SEGMENT: &str = "login";

/// Last segment of a path, if it is non-empty.
pub fn terminal_segment(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|segment| !segment.is_empty())
}

/// The caller's token. A present but unreadable header is a malformed request,
/// not a missing login.
fn read_token(headers: &HeaderMap) -> Result<String, GatewayError> {
    let value = headers.get(TOKEN_HEADER).ok_or(GatewayError::Unauthenticated)?;
    value
        .to_str()
        .map(str::to_string)
        .map_err(|_| GatewayError::Decode("token header is not valid text".into()))
}

pub async fn auth_gate(mut req: Request<Body>, next: Next) -> Response {
    // 1. Resolve the operation from the last path segment.
    let requires_token = match terminal_segment(req.uri().path()) {
        Some(segment) => segment != LOGIN_SEGMENT,
        None => {
            tracing::warn!(path = %req.uri().path(), "Request path has no terminal segment");
            return GatewayError::RouteNotFound.into_response();
        }
    };

    // 2. Open the request span.
    let trace = RequestTrace::start(req.method(), req.uri(), req.headers());
    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // 3. Require the token on protected routes.
    let token = if requires_token {
        match read_token(req.headers()) {
            Ok(token) => {
                trace.record_token(&token);
                Some(token)
            }
            Err(err) => {
                let response = trace.span().in_scope(|| {
                    tracing::info!(path = %req.uri().path(), reason = %err, "Rejected request at the token gate");
                    err.into_response()
                });
                trace.finish(response.status());
                return response;
            }
        }
    } else {
        None
    };

    // 4. Hand the typed context to the dispatcher.
    req.extensions_mut()
        .insert(RequestContext::new(token, trace.span().clone(), request_id));

    let response = next.run(req).instrument(trace.span().clone()).await;
    trace.finish(response.status());
    response
}
