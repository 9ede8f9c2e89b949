//! Managed HTTP listener lifecycle.
//!
//! A [`Receiver`] binds a port, serves a caller-supplied handler wrapped in
//! request tracing, and shuts down gracefully when its [`ListenContext`] is
//! cancelled.
//!
//! ```no_run
//! use std::time::Duration;
//! use axum::{routing::post, Router};
//! use message_receiver::{ListenContext, Receiver};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), message_receiver::ReceiverError> {
//! let handler = Router::new().route("/{namespace}/{broker}", post(|| async { "ok" }));
//! let token = CancellationToken::new();
//! let ctx = ListenContext::new(token.clone()).with_shutdown_timeout(Duration::from_secs(10));
//!
//! Receiver::new(8080).start_listen(ctx, handler).await
//! # }
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ReceiverConfig;
pub use lifecycle::{ListenContext, Receiver, ReceiverError, ReceiverState, DEFAULT_SHUTDOWN_TIMEOUT};
pub use observability::{create_handler, format_span_name, RequestTraceExt, TraceContext};
