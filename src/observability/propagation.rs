//! Trace context propagation.
//!
//! Inbound requests may carry W3C Trace Context (`traceparent`) or B3
//! (single `b3` header or the `X-B3-*` family); W3C wins when both are
//! present. Egress is W3C only: [`TraceContext::inject`] writes
//! `traceparent` and strips any B3 headers from the outgoing map.

use std::collections::HashMap;

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry::trace::{SpanContext, TraceContextExt as _, TraceId};
use opentelemetry::Context;
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing::field::display;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACEPARENT: &str = "traceparent";
pub const B3: &str = "b3";
pub const B3_TRACE_ID: &str = "x-b3-traceid";
pub const B3_SPAN_ID: &str = "x-b3-spanid";
pub const B3_PARENT_SPAN_ID: &str = "x-b3-parentspanid";
pub const B3_SAMPLED: &str = "x-b3-sampled";
pub const B3_FLAGS: &str = "x-b3-flags";

const B3_HEADERS: [&str; 6] = [B3, B3_TRACE_ID, B3_SPAN_ID, B3_PARENT_SPAN_ID, B3_SAMPLED, B3_FLAGS];

/// Propagator for inbound requests: B3 (single or multi header), then W3C.
///
/// A later propagator overrides what an earlier one extracted, so W3C is last.
pub fn inbound_propagator() -> TextMapCompositePropagator {
    TextMapCompositePropagator::new(vec![
        Box::new(opentelemetry_zipkin::Propagator::new()),
        Box::new(TraceContextPropagator::new()),
    ])
}

/// Extract the caller's trace context. Invalid or missing headers give an
/// empty context, so the request span starts a new trace.
pub fn extract(headers: &HeaderMap) -> Context {
    inbound_propagator().extract(&HeaderExtractor(headers))
}

/// Whether `cx` carries a usable span context.
pub fn has_remote_parent(cx: &Context) -> bool {
    cx.span().span_context().is_valid()
}

/// Trace context of the span serving one request.
///
/// Stored in the request extensions by [`attach_trace_context`].
#[derive(Debug, Clone)]
pub struct TraceContext(Context);

impl TraceContext {
    /// Context of the current span. Falls back to `remote` when no
    /// OpenTelemetry layer is recording, so the caller's trace still reaches
    /// egress.
    pub fn resolve(remote: Context) -> Self {
        let current = Span::current().context();
        if has_remote_parent(&current) {
            Self(current)
        } else {
            Self(remote)
        }
    }

    pub fn context(&self) -> &Context {
        &self.0
    }

    pub fn span_context(&self) -> SpanContext {
        self.0.span().span_context().clone()
    }

    /// Trace ID, if there is a trace at all.
    pub fn trace_id(&self) -> Option<TraceId> {
        let span_context = self.span_context();
        span_context.is_valid().then(|| span_context.trace_id())
    }

    /// W3C `traceparent` value for this context.
    pub fn traceparent(&self) -> Option<String> {
        let mut carrier = HashMap::new();
        TraceContextPropagator::new().inject_context(&self.0, &mut carrier);
        carrier.remove(TRACEPARENT)
    }

    /// Write this context into outgoing request headers.
    pub fn inject(&self, headers: &mut HeaderMap) {
        for name in B3_HEADERS {
            headers.remove(name);
        }
        TraceContextPropagator::new().inject_context(&self.0, &mut HeaderInjector(headers));
    }
}

/// Extension trait for reading the trace context off a request.
pub trait RequestTraceExt {
    fn trace_context(&self) -> Option<&TraceContext>;
}

impl<B> RequestTraceExt for axum::http::Request<B> {
    fn trace_context(&self) -> Option<&TraceContext> {
        self.extensions().get::<TraceContext>()
    }
}

/// Middleware attaching a [`TraceContext`] to every request.
///
/// Runs inside the request span, so the stored context is that span's.
pub async fn attach_trace_context(mut request: Request, next: Next) -> Response {
    let context = TraceContext::resolve(extract(request.headers()));
    if let Some(trace_id) = context.trace_id() {
        Span::current().record("trace_id", display(trace_id));
    }
    request.extensions_mut().insert(context);
    next.run(request).await
}
