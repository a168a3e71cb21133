//! Distributed tracing support.
//!
//! # Responsibilities
//! - Extract the W3C trace context (`traceparent`, `tracestate`) from inbound requests
//! - Propagate it to backend calls as gRPC metadata
//! - Create spans for the inbound request and the outbound call
//!
//! # Design Decisions
//! - `tracing` spans are bridged to OpenTelemetry through `tracing-opentelemetry`;
//!   the W3C wire format is owned by `TraceContextPropagator`
//! - An inbound context becomes the parent of the request span; otherwise a new
//!   trace starts
//! - The request span is owned by [`RequestTrace`] and closed when it is
//!   finished or dropped, so every exit path closes it exactly once

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use std::fmt;
use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};
use tracing::field::Empty;
use tracing::{Span, Subscriber};
use tracing_opentelemetry::{OpenTelemetryLayer, OpenTelemetrySpanExt};
use tracing_subscriber::registry::LookupSpan;

/// Service name reported on every exported span.
pub const SERVICE_NAME: &str = "account-gateway";

/// Component tag put on every inbound request span.
pub const COMPONENT: &str = "axum-http";

/// Register the W3C trace context propagator process-wide.
pub fn install_propagator() {
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
}

/// Tracer provider for the gateway's spans.
pub fn tracer_provider() -> SdkTracerProvider {
    SdkTracerProvider::builder()
        .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
        .build()
}

/// Layer bridging `tracing` spans into `provider`.
pub fn otel_layer<S>(provider: &SdkTracerProvider) -> OpenTelemetryLayer<S, SdkTracer>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

struct MetadataInjector<'a>(&'a mut MetadataMap);

impl Injector for MetadataInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let key = MetadataKey::<Ascii>::from_bytes(key.as_bytes());
        let value = MetadataValue::<Ascii>::try_from(value.as_str());
        if let (Ok(key), Ok(value)) = (key, value) {
            self.0.insert(key, value);
        }
    }
}

/// Write the context of `span` into outbound call metadata.
pub fn inject_context(span: &Span, metadata: &mut MetadataMap) {
    let cx = span.context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut MetadataInjector(metadata));
    });
}

/// The span covering one inbound request.
#[derive(Debug)]
pub struct RequestTrace {
    span: Span,
}

impl RequestTrace {
    /// Open the request span, continuing an inbound trace if present.
    pub fn start(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let span = tracing::info_span!(
            "http.request",
            otel.kind = "server",
            http.method = %method,
            http.url = %uri.path(),
            component = COMPONENT,
            token = Empty,
            http.status_code = Empty,
        );
        let parent = opentelemetry::global::get_text_map_propagator(|propagator| {
            propagator.extract(&HeaderExtractor(headers))
        });
        span.set_parent(parent);
        Self { span }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Attach the caller's token for debugging.
    pub fn record_token(&self, token: &str) {
        self.span.record("token", token);
    }

    /// Record the final status and close the span.
    pub fn finish(self, status: StatusCode) {
        self.span.record("http.status_code", status.as_u16());
    }
}

/// Open the client span for one backend call, as a child of `parent`.
pub fn client_span(service: &str, method: &str, parent: &Span) -> Span {
    tracing::info_span!(
        parent: parent,
        "rpc.call",
        otel.kind = "client",
        rpc.system = "grpc",
        rpc.service = service,
        rpc.method = method,
        error = Empty,
        error.message = Empty,
    )
}

/// Flag a span as failed and keep the reason on it.
pub fn record_error(span: &Span, reason: &dyn fmt::Display) {
    span.record("error", true);
    span.record("error.message", tracing::field::display(reason));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
    use opentelemetry::Context;
    use std::str::FromStr;
    use tracing_subscriber::layer::SubscriberExt;

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SAMPLE: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    fn inbound_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("traceparent", HeaderValue::from_static(SAMPLE));
        headers.insert("tracestate", HeaderValue::from_static("vendor=x"));
        headers
    }

    #[test]
    fn extractor_reads_trace_headers() {
        let headers = inbound_headers();
        let extractor = HeaderExtractor(&headers);
        assert_eq!(extractor.get("traceparent"), Some(SAMPLE));
        let mut keys = extractor.keys();
        keys.sort();
        assert_eq!(keys, vec!["traceparent", "tracestate"]);
    }

    #[test]
    fn injector_writes_traceparent_and_tracestate() {
        let span_context = SpanContext::new(
            TraceId::from_hex(TRACE_ID).unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::from_str("vendor=x").unwrap(),
        );
        let cx = Context::new().with_remote_span_context(span_context);

        let mut metadata = MetadataMap::new();
        TraceContextPropagator::new().inject_context(&cx, &mut MetadataInjector(&mut metadata));

        assert_eq!(metadata.get("traceparent").unwrap().to_str().unwrap(), SAMPLE);
        assert_eq!(metadata.get("tracestate").unwrap().to_str().unwrap(), "vendor=x");
    }

    #[test]
    fn call_span_continues_inbound_trace() {
        let provider = tracer_provider();
        let subscriber = tracing_subscriber::registry().with(otel_layer(&provider));

        tracing::subscriber::with_default(subscriber, || {
            install_propagator();
            let uri = Uri::from_static("/mall/bff/account/list");
            let trace = RequestTrace::start(&Method::POST, &uri, &inbound_headers());
            let call = client_span("account.AccountService", "AccountList", trace.span());

            let mut metadata = MetadataMap::new();
            inject_context(&call, &mut metadata);

            let traceparent = metadata.get("traceparent").unwrap().to_str().unwrap().to_string();
            let parts: Vec<&str> = traceparent.split('-').collect();
            assert_eq!(parts[1], TRACE_ID);
            assert_ne!(parts[2], "00f067aa0ba902b7");
            assert_eq!(metadata.get("tracestate").unwrap().to_str().unwrap(), "vendor=x");
        });
    }

    #[test]
    fn without_inbound_context_a_new_trace_starts() {
        let provider = tracer_provider();
        let subscriber = tracing_subscriber::registry().with(otel_layer(&provider));

        tracing::subscriber::with_default(subscriber, || {
            install_propagator();
            let uri = Uri::from_static("/mall/bff/account/login");
            let trace = RequestTrace::start(&Method::POST, &uri, &HeaderMap::new());

            let trace_id = trace.span().context().span().span_context().trace_id();
            assert_ne!(trace_id, TraceId::INVALID);
            assert_ne!(trace_id.to_string(), TRACE_ID);
        });
    }
}
