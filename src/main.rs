//! Account gateway (v1)
//!
//! Public JSON-over-HTTP front for the account service, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────▶ http::server ──▶ middleware::auth ──▶ dispatch ──▶ net (connect, bounded)
//!                                                       │               │
//!                                                       │               ▼
//!     Client Response                                   │          rpc::client ──▶ Account
//!     ◀────── http::response (envelope) ◀───────────────┘          (call, bounded)   Service
//!
//!     Cross-cutting: config, observability (logs, spans, metrics), lifecycle
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use account_gateway::config::{load_config, GatewayConfig};
use account_gateway::lifecycle::{signals::spawn_signal_handler, start, Shutdown};
use account_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "account-gateway")]
#[command(about = "JSON-over-HTTP gateway for the account service", long_about = None)]
struct Cli {
    /// TOML config file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    let tracer_provider = init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "account-gateway starting"
    );

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(shutdown.clone());

    let served = start(config, &shutdown).await;

    if let Err(e) = tracer_provider.shutdown() {
        tracing::warn!(error = %e, "Tracer provider shutdown failed");
    }
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
