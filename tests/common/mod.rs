//! Shared utilities for integration testing.

#![allow(dead_code)]

use account_gateway::config::GatewayConfig;
use account_gateway::observability::tracing::{install_propagator, otel_layer, tracer_provider};
use account_gateway::rpc::messages::*;
use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpListener;
use tonic::codec::ProstCodec;
use tonic::codegen::{http, Body as HttpBody, BoxFuture, Service, StdError};
use tonic::server::{NamedService, UnaryService};
use tonic::transport::Server;
use tonic::{Code, Status};
use tower::ServiceExt;
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;

/// One call the mock account service received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub token: Option<String>,
    pub traceparent: Option<String>,
    pub tracestate: Option<String>,
    pub grpc_timeout: Option<String>,
    pub request_id: Option<String>,
    pub body: Value,
}

/// Programmed answer for one backend method.
#[derive(Debug, Clone)]
pub struct Reply {
    outcome: Result<Value, (Code, String)>,
    delay: Duration,
}

impl Reply {
    /// Success with the response message given as JSON.
    pub fn ok(body: Value) -> Self {
        Self {
            outcome: Ok(body),
            delay: Duration::ZERO,
        }
    }

    /// Failure with a gRPC status.
    pub fn status(code: Code, message: &str) -> Self {
        Self {
            outcome: Err((code, message.to_string())),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct MockState {
    calls: Mutex<Vec<RecordedCall>>,
    replies: Mutex<HashMap<String, Reply>>,
}

/// In-process `account.AccountService` served by tonic.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockBackend {
    /// Start on an ephemeral port. Unprogrammed methods answer the default message.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let service = MockAccountService {
            state: state.clone(),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let incoming = Box::pin(futures_util::stream::unfold(listener, |listener| async move {
            let accepted = listener.accept().await.map(|(stream, _)| stream);
            Some((accepted, listener))
        }));

        tokio::spawn(async move {
            let _ = Server::builder()
                .add_service(service)
                .serve_with_incoming(incoming)
                .await;
        });

        Self { addr, state }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn reply(&self, method: &str, reply: Reply) {
        self.state
            .replies
            .lock()
            .unwrap()
            .insert(method.to_string(), reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }
}

#[derive(Clone)]
struct MockAccountService {
    state: Arc<MockState>,
}

impl NamedService for MockAccountService {
    const NAME: &'static str = "account.AccountService";
}

impl<B> Service<http::Request<B>> for MockAccountService
where
    B: HttpBody + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let state = self.state.clone();
        let method = req.uri().path().rsplit('/').next().unwrap_or_default().to_string();

        Box::pin(async move {
            let response = match method.as_str() {
                "Login" => serve::<LoginRequest, LoginResponse, B>(state, method.clone(), req).await,
                "CreateAccount" => serve::<CreateAccountRequest, Empty, B>(state, method.clone(), req).await,
                "UpdateAccountName" => {
                    serve::<UpdateAccountNameRequest, Empty, B>(state, method.clone(), req).await
                }
                "UpdateAccountPassword" => {
                    serve::<UpdateAccountPasswordRequest, Empty, B>(state, method.clone(), req).await
                }
                "DeleteAccount" => serve::<DeleteAccountRequest, Empty, B>(state, method.clone(), req).await,
                "AccountList" => {
                    serve::<AccountListRequest, AccountListResponse, B>(state, method.clone(), req).await
                }
                _ => Status::unimplemented(format!("unknown method {method}")).into_http(),
            };
            Ok(response)
        })
    }
}

async fn serve<Req, Resp, B>(
    state: Arc<MockState>,
    method: String,
    req: http::Request<B>,
) -> http::Response<tonic::body::Body>
where
    Req: prost::Message + Default + Serialize + Send + 'static,
    Resp: prost::Message + Default + DeserializeOwned + Send + 'static,
    B: HttpBody + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    let handler = MethodHandler::<Req, Resp> {
        state,
        method,
        _types: PhantomData,
    };
    let mut grpc = tonic::server::Grpc::new(ProstCodec::<Resp, Req>::default());
    grpc.unary(handler, req).await
}

struct MethodHandler<Req, Resp> {
    state: Arc<MockState>,
    method: String,
    _types: PhantomData<fn(Req) -> Resp>,
}

fn record<Req: Serialize>(method: &str, request: &tonic::Request<Req>) -> RecordedCall {
    let value = |name: &str| {
        request
            .metadata()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    RecordedCall {
        method: method.to_string(),
        token: value("token"),
        traceparent: value("traceparent"),
        tracestate: value("tracestate"),
        grpc_timeout: value("grpc-timeout"),
        request_id: value("x-request-id"),
        body: serde_json::to_value(request.get_ref()).unwrap_or(Value::Null),
    }
}

impl<Req, Resp> UnaryService<Req> for MethodHandler<Req, Resp>
where
    Req: Serialize + Send + 'static,
    Resp: DeserializeOwned + Default + Send + 'static,
{
    type Response = Resp;
    type Future = BoxFuture<tonic::Response<Resp>, Status>;

    fn call(&mut self, request: tonic::Request<Req>) -> Self::Future {
        let call = record(&self.method, &request);
        self.state.calls.lock().unwrap().push(call);
        let reply = self.state.replies.lock().unwrap().get(&self.method).cloned();

        Box::pin(async move {
            let Some(reply) = reply else {
                return Ok(tonic::Response::new(Resp::default()));
            };
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            match reply.outcome {
                Ok(body) => serde_json::from_value(body)
                    .map(tonic::Response::new)
                    .map_err(|e| Status::internal(e.to_string())),
                Err((code, message)) => Err(Status::new(code, message)),
            }
        })
    }
}

/// Gateway config pointing at `backend`, with short budgets for tests.
pub fn gateway_config(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backend.address = backend.to_string();
    config.timeouts.connect_ms = 500;
    config.timeouts.call_ms = 1000;
    config
}

/// Subscriber exporting spans to OpenTelemetry, with the W3C propagator installed.
pub fn otel_subscriber() -> impl Subscriber + Send + Sync {
    install_propagator();
    let provider = tracer_provider();
    tracing_subscriber::registry().with(otel_layer(&provider))
}

/// POST `body` to `path` through `router`; returns status and parsed envelope.
pub async fn post_json(
    router: Router,
    path: &str,
    token: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    post_with_headers(router, path, token, &[], body).await
}

pub async fn post_with_headers(
    router: Router,
    path: &str,
    token: Option<&str>,
    headers: &[(&str, &str)],
    body: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("token", token);
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(router, builder.body(Body::from(body.to_string())).unwrap()).await
}

/// Send a prepared request through `router`; returns status and parsed envelope.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let envelope = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, envelope)
}

/// A `Token` header holding bytes that are not visible ASCII.
pub fn opaque_token() -> HeaderValue {
    HeaderValue::from_bytes(b"t\xff").unwrap()
}

/// Assert the envelope has `code` in {0, 1}, a `msg`, and nothing but optional `data`.
pub fn assert_envelope_shape(envelope: &Value) {
    let object = envelope.as_object().expect("envelope should be an object");
    let code = object.get("code").and_then(Value::as_u64).expect("code");
    assert!(code == 0 || code == 1, "code out of range: {code}");
    assert!(object.get("msg").map(Value::is_string).unwrap_or(false));
    for key in object.keys() {
        assert!(
            matches!(key.as_str(), "code" | "msg" | "data"),
            "unexpected envelope field {key}"
        );
    }
}
