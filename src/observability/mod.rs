//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → tracing.rs (span named broker:<ns>.<broker>, parented on the caller)
//!     → propagation.rs (extract W3C / B3 context, attach TraceContext)
//!     → metrics.rs (request, connection and shutdown counters)
//!
//! Process start:
//!     → logging.rs (subscriber, text or JSON)
//!     → metrics.rs (optional Prometheus exporter)
//! ```
//!
//! # Design Decisions
//! - The tracing decorator never touches response content
//! - Egress propagation uses W3C Trace Context only
//! - Metrics are cheap and silent when no exporter is installed

pub mod logging;
pub mod metrics;
pub mod propagation;
pub mod tracing;

pub use propagation::{RequestTraceExt, TraceContext};
pub use self::tracing::{broker_trace_layer, create_handler, format_span_name};
