//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the metrics exporter when enabled
//! - Bind the listener
//! - Serve until the shutdown signal fires
//!
//! Logging is installed by the binary before anything here runs, so
//! library users keep control of the global subscriber.

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics::init_metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid metrics address {0}")]
    MetricsAddress(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Bring the gateway up and serve until `shutdown` is triggered.
pub async fn start(config: GatewayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        init_metrics(addr);
    }

    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    tracing::info!(
        address = %listener.local_addr()?,
        backend = %config.backend.address,
        connect_ms = config.timeouts.connect_ms,
        call_ms = config.timeouts.call_ms,
        "Listening for connections"
    );

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
