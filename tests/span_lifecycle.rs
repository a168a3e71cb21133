//! The request span closes exactly once on every exit path.

use account_gateway::http::HttpServer;
use account_gateway::rpc::Code;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::span::Id;
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

mod common;

use common::{gateway_config, post_json, MockBackend, Reply};

/// Counts opened and closed spans with a given name.
#[derive(Clone)]
struct SpanCounter {
    name: &'static str,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl SpanCounter {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<S> Layer<S> for SpanCounter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() == self.name {
            self.opened.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(&id) {
            if span.name() == self.name {
                self.closed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

#[tokio::test]
async fn test_request_span_closes_once_per_request() {
    let requests = SpanCounter::new("http.request");
    let calls = SpanCounter::new("rpc.call");
    let subscriber = tracing_subscriber::registry()
        .with(requests.clone())
        .with(calls.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend = MockBackend::start().await;
    backend.reply("CreateAccount", Reply::status(Code::AlreadyExists, "duplicate name"));
    let server = HttpServer::new(gateway_config(backend.addr()));

    // Success.
    post_json(server.router(), "/mall/bff/account/delete", Some("abc"), r#"{"id":1}"#).await;
    // Missing token: aborted in the gate.
    post_json(server.router(), "/mall/bff/account/delete", None, r#"{"id":1}"#).await;
    // Validation failure: no backend call.
    post_json(server.router(), "/mall/bff/account/delete", Some("abc"), "{}").await;
    // Backend failure.
    post_json(
        server.router(),
        "/mall/bff/account/add",
        Some("abc"),
        r#"{"name":"alice","password":"pw"}"#,
    )
    .await;

    assert_eq!(requests.opened(), 4);
    assert_eq!(requests.closed(), 4);
    assert_eq!(calls.opened(), 2);
    assert_eq!(calls.closed(), 2);
}
