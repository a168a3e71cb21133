//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline produces:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (request/call spans, W3C trace context propagation)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//!     → OpenTelemetry tracer provider (spans)
//!     → The backend, which continues the trace from `traceparent`/`tracestate`
//! ```

pub mod logging;
pub mod metrics;
pub mod tracing;
