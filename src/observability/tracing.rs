//! Request tracing decorator.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests
//! - Open one span per request, named after the broker it addresses
//! - Record request outcome and latency
//!
//! # Design Decisions
//! - Transparent: removing the decorator changes nothing but spans
//! - Paths shaped `/<namespace>/<broker>` get the span name
//!   `broker:<namespace>.<broker>` via `otel.name`; anything else leaves
//!   naming to the backend

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::Service;
use tower_http::trace::{DefaultOnRequest, HttpMakeClassifier, MakeSpan, OnResponse, TraceLayer};
use tracing::field::Empty;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::observability::metrics;
use crate::observability::propagation::{self, attach_trace_context};

/// Span name for a request path, or `""` when the path does not address a broker.
pub fn format_span_name(path: &str) -> String {
    let pieces: Vec<&str> = path.split('/').collect();
    match pieces.as_slice() {
        ["", namespace, broker] if !namespace.is_empty() && !broker.is_empty() => {
            format!("broker:{namespace}.{broker}")
        }
        _ => String::new(),
    }
}

/// Opens the per-request span and parents it on the caller's trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokerMakeSpan;

impl<B> MakeSpan<B> for BrokerMakeSpan {
    fn make_span(&mut self, request: &http::Request<B>) -> Span {
        let path = request.uri().path();
        let span = tracing::info_span!(
            "request",
            method = %request.method(),
            path = %path,
            otel.name = Empty,
            otel.kind = "server",
            trace_id = Empty,
        );

        let name = format_span_name(path);
        if !name.is_empty() {
            span.record("otel.name", name.as_str());
        }

        let remote = propagation::extract(request.headers());
        if propagation::has_remote_parent(&remote) {
            // Fails only when no OpenTelemetry layer is installed.
            let _ = span.set_parent(remote);
        }

        span
    }
}

/// Logs each completed response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordResponse;

impl<B> OnResponse<B> for RecordResponse {
    fn on_response(self, response: &http::Response<B>, latency: Duration, span: &Span) {
        tracing::debug!(
            parent: span,
            status = response.status().as_u16(),
            latency = ?latency,
            "Request completed"
        );
    }
}

/// Counts each request by method and status.
pub async fn record_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let started = Instant::now();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), started.elapsed());
    response
}

/// The tracing layer applied by [`create_handler`].
pub type BrokerTraceLayer = TraceLayer<HttpMakeClassifier, BrokerMakeSpan, DefaultOnRequest, RecordResponse>;

/// Build the tracing layer on its own, for callers composing their own stack.
pub fn broker_trace_layer() -> BrokerTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(BrokerMakeSpan)
        .on_response(RecordResponse)
}

/// Wrap `handler` with per-request spans and trace-context propagation.
pub fn create_handler<H>(handler: H) -> Router
where
    H: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
    H::Response: IntoResponse,
    H::Future: Send + 'static,
{
    Router::new()
        .fallback_service(handler)
        .layer(middleware::from_fn(record_request))
        .layer(middleware::from_fn(attach_trace_context))
        .layer(broker_trace_layer())
}
