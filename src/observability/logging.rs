//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from the environment or the config file
//! - Bridge spans to OpenTelemetry and install the W3C propagator
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over `observability.log_level`
//! - Span close events are logged so each request's span lifetime is visible

use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::observability::tracing::{install_propagator, otel_layer, tracer_provider};

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(config: &ObservabilityConfig) -> String {
    format!(
        "account_gateway={level},tower_http={level}",
        level = config.log_level
    )
}

/// Install the global subscriber. Call once, at startup.
///
/// The returned provider should be shut down before exit.
pub fn init_logging(config: &ObservabilityConfig) -> SdkTracerProvider {
    install_propagator();
    let provider = tracer_provider();
    opentelemetry::global::set_tracer_provider(provider.clone());

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(config))),
        )
        .with(tracing_subscriber::fmt::layer().with_span_events(FmtSpan::CLOSE))
        .with(otel_layer(&provider))
        .init();
    provider
}
