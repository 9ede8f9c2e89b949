//! Shutdown coordination for the receiver.
//!
//! A [`ListenContext`] is what the caller hands to
//! [`Receiver::start_listen`](crate::lifecycle::Receiver::start_listen):
//! a cancellation token that requests shutdown, and the time budget the
//! graceful drain gets once it does.

use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Drain budget used when the context carries no explicit timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Graceful shutdown did not finish cleanly.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// In-flight connections outlived the drain budget and were closed.
    #[error("Forced shutdown after {timeout:?}: {remaining} connection(s) still open")]
    Forced {
        /// Connections that were still open when the budget ran out.
        remaining: usize,
        /// The budget that was exceeded.
        timeout: Duration,
    },
}

/// Execution context for one serving invocation.
#[derive(Debug, Clone, Default)]
pub struct ListenContext {
    token: CancellationToken,
    shutdown_timeout: Option<Duration>,
}

impl ListenContext {
    /// Create a context that is cancelled through `token`.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            shutdown_timeout: None,
        }
    }

    /// Derive a context that carries `timeout` as its drain budget.
    pub fn with_shutdown_timeout(self, timeout: Duration) -> Self {
        Self {
            shutdown_timeout: Some(timeout),
            ..self
        }
    }

    /// Derive a context cancelled together with this one (or on its own),
    /// inheriting the drain budget.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            shutdown_timeout: self.shutdown_timeout,
        }
    }

    /// Resolve the drain budget, falling back to [`DEFAULT_SHUTDOWN_TIMEOUT`].
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// The token whose cancellation requests shutdown.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Request shutdown.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
