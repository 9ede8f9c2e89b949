//! Listener lifecycle coordinator.
//!
//! [`Receiver::start_listen`] binds the port, serves the decorated handler on
//! a background task and blocks until either the [`ListenContext`] is
//! cancelled (graceful shutdown) or the server stops on its own (failure).
//! Whichever happens first decides the outcome; the serving task is awaited
//! on both paths before returning.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::extract::Request;
use axum::response::IntoResponse;
use axum::Router;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tower::Service;

use crate::http::server::{Drain, HttpServer, ServeError};
use crate::lifecycle::shutdown::{ListenContext, ShutdownError};
use crate::net::{Accept, BindError, Listener};
use crate::observability::tracing::create_handler;

/// Terminal outcome of a failed [`Receiver::start_listen`] call.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// The listening socket could not be acquired.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// The server stopped before shutdown was requested.
    #[error(transparent)]
    Serve(#[from] ServeError),

    /// Graceful shutdown ran out of time.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// `start_listen` was called while another call was still running.
    #[error("Receiver on port {port} is already running")]
    AlreadyRunning { port: u16 },
}

/// Lifecycle state of a [`Receiver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Constructed, not started.
    Idle,
    /// Acquiring the listening socket.
    Binding,
    /// Accepting and dispatching requests.
    Serving,
    /// Draining in-flight requests after cancellation.
    ShuttingDown,
    /// Bind or serve failed.
    Failed,
    /// `start_listen` has returned.
    Stopped,
}

/// One HTTP listening endpoint.
///
/// Sequential `start_listen` calls each bind afresh; overlapping calls on
/// the same instance are rejected with [`ReceiverError::AlreadyRunning`].
///
/// Dropping a `start_listen` future instead of cancelling its context aborts
/// the serving task, but the socket closes only when the runtime next drops
/// that task. An immediate re-call on the same fixed port may briefly see
/// `AddrInUse`; cancel the context and await the call for a synchronous
/// release.
#[derive(Debug)]
pub struct Receiver {
    port: u16,
    running: AtomicBool,
    local_addr: ArcSwapOption<SocketAddr>,
    state: watch::Sender<ReceiverState>,
}

impl Receiver {
    /// Create a receiver for `port`. No I/O happens until `start_listen`.
    pub fn new(port: u16) -> Self {
        let (state, _) = watch::channel(ReceiverState::Idle);
        Self {
            port,
            running: AtomicBool::new(false),
            local_addr: ArcSwapOption::empty(),
            state,
        }
    }

    /// The configured port (0 means ephemeral).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address actually bound, while serving.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.load_full().map(|addr| *addr)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReceiverState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ReceiverState> {
        self.state.subscribe()
    }

    /// Bind, serve `handler` and block until cancellation or failure.
    ///
    /// Returns `Ok(())` after a clean graceful shutdown.
    pub async fn start_listen<H>(&self, ctx: ListenContext, handler: H) -> Result<(), ReceiverError>
    where
        H: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
        H::Response: IntoResponse,
        H::Future: Send + 'static,
    {
        if self.running.swap(true, Ordering::AcqRel) {
            tracing::warn!(port = self.port, "start_listen called while already running");
            return Err(ReceiverError::AlreadyRunning { port: self.port });
        }
        let _running = RunningGuard(self);

        self.run(ctx, create_handler(handler)).await
    }

    async fn run(&self, ctx: ListenContext, service: Router) -> Result<(), ReceiverError> {
        self.set_state(ReceiverState::Binding);

        let listener = match Listener::bind(self.port).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(port = self.port, error = %e, "Bind failed");
                self.set_state(ReceiverState::Failed);
                return Err(e.into());
            }
        };

        self.serve_until_done(ctx, service, listener).await
    }

    async fn serve_until_done<A: Accept>(
        &self,
        ctx: ListenContext,
        service: Router,
        listener: A,
    ) -> Result<(), ReceiverError> {
        self.local_addr.store(Some(Arc::new(listener.local_addr())));

        let stop = CancellationToken::new();
        let server = HttpServer::new(service, stop.clone());
        // Aborted if this future is abandoned.
        let mut serving = AbortOnDropHandle::new(tokio::spawn(server.serve(listener)));
        self.set_state(ReceiverState::Serving);

        tokio::select! {
            biased;

            () = ctx.cancelled() => {
                self.set_state(ReceiverState::ShuttingDown);
                let timeout = ctx.shutdown_timeout();
                tracing::info!(port = self.port, timeout = ?timeout, "Shutdown requested");

                stop.cancel();
                match flatten(serving.await) {
                    Ok(drain) => Ok(drain.shutdown(timeout).await?),
                    Err(e) => {
                        tracing::warn!(port = self.port, error = %e, "Server exited before shutdown began");
                        Ok(())
                    }
                }
            }

            joined = &mut serving => match flatten(joined) {
                Ok(drain) => Ok(drain.shutdown(ctx.shutdown_timeout()).await?),
                Err(e) => {
                    tracing::error!(port = self.port, error = %e, "Server exited unexpectedly");
                    self.set_state(ReceiverState::Failed);
                    Err(e.into())
                }
            },
        }
    }

    fn set_state(&self, state: ReceiverState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(port = self.port, from = ?previous, to = ?state, "Receiver state changed");
        }
    }
}

fn flatten(joined: Result<Result<Drain, ServeError>, JoinError>) -> Result<Drain, ServeError> {
    joined.map_err(|e| ServeError::Task(e.to_string()))?
}

/// Resets the receiver when `start_listen` returns or is dropped mid-flight.
struct RunningGuard<'a>(&'a Receiver);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let receiver = self.0;
        receiver.local_addr.store(None);
        receiver.set_state(ReceiverState::Stopped);
        receiver.running.store(false, Ordering::Release);
    }
}
