//! Event receiver service.
//!
//! Binds a port, accepts events for `/<namespace>/<broker>` and drains
//! in-flight requests on SIGINT/SIGTERM.
//!
//! ```text
//!     Client Request        ┌──────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ net::listener ─▶ http::server ─▶ tracing ──┼─▶ handler
//!                           │                                              │
//!     SIGTERM / SIGINT      │   lifecycle::signals ─▶ ListenContext        │
//!     ──────────────────────┼─▶   cancelled ─▶ Receiver drains (bounded)   │
//!                           └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use message_receiver::config::{load_config, LogFormat, ReceiverConfig};
use message_receiver::lifecycle::signals::cancel_on_signal;
use message_receiver::observability::{logging, metrics};
use message_receiver::{Receiver, RequestTraceExt};

#[derive(Parser)]
#[command(name = "message-receiver")]
#[command(about = "HTTP event receiver with graceful shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Seconds in-flight requests get to finish on shutdown.
    #[arg(long)]
    shutdown_timeout_secs: Option<u64>,

    /// Log output format: text or json.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn into_config(self) -> Result<ReceiverConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ReceiverConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(secs) = self.shutdown_timeout_secs {
            config.shutdown.timeout_secs = secs;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }

        Ok(config)
    }
}

/// Accept any event POSTed to the receiver.
///
/// The acknowledgement carries the request's `traceparent` so the sender can
/// correlate its delivery with the receiver's span.
async fn accept_event(request: axum::extract::Request) -> Response {
    if request.method() != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let mut response = StatusCode::ACCEPTED.into_response();
    if let Some(ctx) = request.trace_context() {
        ctx.inject(response.headers_mut());
    }

    tracing::info!(path = %request.uri().path(), "Event accepted");
    response
}

async fn run(config: ReceiverConfig) -> Result<(), Box<dyn std::error::Error>> {
    let tracer_provider = logging::init_logging(&config.observability)?;

    tracing::info!(
        port = config.listener.port,
        shutdown_timeout_secs = config.shutdown.timeout_secs,
        log_format = %config.observability.log_format,
        "message-receiver v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let token = CancellationToken::new();
    let signals = cancel_on_signal(token.clone());

    let receiver = Receiver::new(config.listener.port);
    let handler = Router::new().fallback(accept_event);
    let result = receiver
        .start_listen(config.listen_context(token.clone()), handler)
        .await;

    // Stops the signal watcher when the receiver exited on its own.
    token.cancel();
    if let Err(e) = signals.await {
        tracing::warn!(error = %e, "Signal watcher task failed");
    }
    if let Err(e) = tracer_provider.shutdown() {
        tracing::warn!(error = %e, "Tracer provider shutdown failed");
    }

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("message-receiver: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "message-receiver exited with error");
            eprintln!("message-receiver: {e}");
            ExitCode::FAILURE
        }
    }
}
