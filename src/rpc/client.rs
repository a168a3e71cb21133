//! Account service client.
//!
//! # Responsibilities
//! - Issue one unary gRPC call per operation on `account.AccountService`
//! - Attach the call deadline (`grpc-timeout`), trace context and request ID
//! - Hand back either the response message or the backend's [`Status`]
//!
//! # Design Decisions
//! - The call deadline covers readiness, send, wait and decode together
//! - Deadline expiry becomes `DeadlineExceeded`, the way RPC clients report it
//! - One attempt per call; the client never retries

use std::time::Duration;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::MetadataValue;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::Span;

use crate::net::BackendConnection;
use crate::observability::tracing::inject_context;
use crate::rpc::credentials::CredentialInterceptor;
use crate::rpc::messages::*;

/// Fully qualified service name used in call paths.
pub const SERVICE: &str = "account.AccountService";

const X_REQUEST_ID: &str = "x-request-id";

/// Per-call options derived from the backend call context.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub deadline: Duration,
    /// Client span whose context is propagated to the backend.
    pub span: Span,
    pub request_id: Option<String>,
}

/// Client for the account service over one request-scoped connection.
pub struct AccountClient {
    grpc: Grpc<InterceptedService<Channel, CredentialInterceptor>>,
    // Held so the connection stays counted until the client is dropped.
    _conn: BackendConnection,
}

impl AccountClient {
    pub fn new(conn: BackendConnection) -> Self {
        Self {
            grpc: Grpc::new(conn.authorized()),
            _conn: conn,
        }
    }

    pub async fn login(&mut self, req: &LoginRequest, opts: &CallOptions) -> Result<LoginResponse, Status> {
        self.unary("Login", req, opts).await
    }

    pub async fn create_account(&mut self, req: &CreateAccountRequest, opts: &CallOptions) -> Result<Empty, Status> {
        self.unary("CreateAccount", req, opts).await
    }

    pub async fn update_account_name(&mut self, req: &UpdateAccountNameRequest, opts: &CallOptions) -> Result<Empty, Status> {
        self.unary("UpdateAccountName", req, opts).await
    }

    pub async fn update_account_password(&mut self, req: &UpdateAccountPasswordRequest, opts: &CallOptions) -> Result<Empty, Status> {
        self.unary("UpdateAccountPassword", req, opts).await
    }

    pub async fn delete_account(&mut self, req: &DeleteAccountRequest, opts: &CallOptions) -> Result<Empty, Status> {
        self.unary("DeleteAccount", req, opts).await
    }

    pub async fn account_list(&mut self, req: &AccountListRequest, opts: &CallOptions) -> Result<AccountListResponse, Status> {
        self.unary("AccountList", req, opts).await
    }

    /// Issue one unary call bounded by `opts.deadline`.
    pub async fn unary<Req, Resp>(&mut self, method: &str, req: &Req, opts: &CallOptions) -> Result<Resp, Status>
    where
        Req: prost::Message + Clone + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let path = PathAndQuery::try_from(format!("/{SERVICE}/{method}"))
            .map_err(|e| Status::internal(format!("invalid method path: {e}")))?;
        let request = build_request(req.clone(), opts);

        let call = async {
            self.grpc
                .ready()
                .await
                .map_err(|e| Status::unavailable(format!("backend not ready: {e}")))?;
            let codec: ProstCodec<Req, Resp> = ProstCodec::default();
            self.grpc.unary(request, path, codec).await
        };

        match tokio::time::timeout(opts.deadline, call).await {
            Ok(result) => result.map(tonic::Response::into_inner),
            Err(_) => Err(Status::deadline_exceeded("deadline exceeded")),
        }
    }
}

fn build_request<Req>(message: Req, opts: &CallOptions) -> Request<Req> {
    let mut request = Request::new(message);
    request.set_timeout(opts.deadline);
    inject_context(&opts.span, request.metadata_mut());

    if let Some(id) = &opts.request_id {
        if let Ok(value) = MetadataValue::try_from(id.as_str()) {
            request.metadata_mut().insert(X_REQUEST_ID, value);
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_deadline_and_request_id() {
        let opts = CallOptions {
            deadline: Duration::from_millis(1500),
            span: Span::none(),
            request_id: Some("req-7".into()),
        };
        let request = build_request(DeleteAccountRequest { id: 3 }, &opts);

        let metadata = request.metadata();
        assert!(metadata.get("grpc-timeout").is_some());
        assert_eq!(metadata.get("x-request-id").unwrap().to_str().unwrap(), "req-7");
        assert_eq!(request.get_ref().id, 3);
    }
}
