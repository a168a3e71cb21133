//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the account routes
//! - Wire up middleware (tracing, limits, request ID, auth gate)
//! - Answer layer failures (wrong method, oversized body, timeout) with the envelope
//! - Bind server to listener
//! - Shut down gracefully on signal

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    middleware,
    routing::post,
    BoxError, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::timeout::error::Elapsed;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::dispatch::{
    handle, ChangePassword, CreateAccount, DeleteAccount, ListAccounts, Login, RenameAccount,
};
use crate::http::middleware::auth_gate;
use crate::http::response::GatewayError;
use crate::net::{ConnectionFactory, TcpTransport, Transport};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub connections: Arc<ConnectionFactory>,
}

/// Turn a layer error into the failure envelope.
async fn request_failed(err: BoxError) -> GatewayError {
    if err.is::<Elapsed>() {
        tracing::warn!("Request exceeded the request timeout");
        GatewayError::Timeout
    } else {
        GatewayError::Decode(err.to_string())
    }
}

/// HTTP server for the account gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
    connections: Arc<ConnectionFactory>,
}

impl HttpServer {
    /// Create a new HTTP server dialing the backend over TCP.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_transport(config, Arc::new(TcpTransport))
    }

    /// Create a server whose backend connections use `transport`.
    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        let config = Arc::new(config);
        let connections = Arc::new(ConnectionFactory::new(
            config.backend.address.clone(),
            transport,
        ));

        let state = AppState {
            config: config.clone(),
            connections: connections.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            connections,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let account = Router::new()
            .route("/account/login", post(handle::<Login>))
            .route("/account/add", post(handle::<CreateAccount>))
            .route("/account/update/name", post(handle::<RenameAccount>))
            .route("/account/update/password", post(handle::<ChangePassword>))
            .route("/account/delete", post(handle::<DeleteAccount>))
            .route("/account/list", post(handle::<ListAccounts>))
            .method_not_allowed_fallback(|| async { GatewayError::RouteNotFound });

        let routes = if config.routes.prefix.is_empty() {
            account
        } else {
            Router::new().nest(&config.routes.prefix, account)
        };

        routes
            .fallback(|| async { GatewayError::RouteNotFound })
            .with_state(state)
            .layer(middleware::from_fn(auth_gate))
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(request_failed))
                    .timeout(Duration::from_secs(config.timeouts.request_secs)),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Router with all layers, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.connections.address(),
            prefix = %self.config.routes.prefix,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The backend connection factory shared by all requests.
    pub fn connections(&self) -> Arc<ConnectionFactory> {
        self.connections.clone()
    }
}
