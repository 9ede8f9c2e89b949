//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick the output format (human-readable text or JSON)
//! - Resolve the log filter (`RUST_LOG` wins over configuration)
//! - Bridge spans to OpenTelemetry so `otel.name` and remote parents apply

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Logging already initialized: {0}")]
    Init(#[from] TryInitError),
}

/// Build the log filter from `RUST_LOG`, falling back to `default_directives`.
pub fn build_filter(default_directives: &str) -> Result<EnvFilter, ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_directives),
    }
}

/// Install the global subscriber.
///
/// Returns the tracer provider backing the OpenTelemetry layer; exporters
/// attach to it, and the caller shuts it down on exit.
pub fn init_logging(config: &ObservabilityConfig) -> Result<SdkTracerProvider, LoggingError> {
    let filter = build_filter(&config.log_level)?;
    let provider = SdkTracerProvider::builder().build();
    let tracer = provider.tracer(env!("CARGO_PKG_NAME"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_opentelemetry::layer().with_tracer(tracer));

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Text => registry.with(fmt::layer()).try_init()?,
    }

    opentelemetry::global::set_tracer_provider(provider.clone());
    Ok(provider)
}
