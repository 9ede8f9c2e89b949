//! HTTP accept/dispatch loop.
//!
//! # Responsibilities
//! - Accept connections from the bound listener until told to stop
//! - Serve each connection (HTTP/1.1 and HTTP/2) on its own task
//! - Back off on transient accept errors, fail on fatal ones
//! - Hand the in-flight connections to a [`Drain`] for bounded shutdown

use std::io;
use std::time::Duration;

use axum::Router;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::{conn::auto::Builder, graceful::GracefulShutdown},
    service::TowerToHyperService,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::ShutdownError;
use crate::net::{Accept, ConnectionTracker};
use crate::observability::metrics;
use crate::resilience::backoff::accept_backoff;
use crate::resilience::retries::is_transient_accept_error;

/// The accept loop ended without being asked to stop.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listening socket returned a non-recoverable error.
    #[error("Accept loop failed: {0}")]
    Accept(#[source] io::Error),

    /// The serving task panicked or was cancelled.
    #[error("Serving task terminated abnormally: {0}")]
    Task(String),
}

/// Accept loop over a single listener.
pub struct HttpServer {
    service: Router,
    stop: CancellationToken,
    builder: Builder<TokioExecutor>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a server dispatching to `service` until `stop` is cancelled.
    pub fn new(service: Router, stop: CancellationToken) -> Self {
        Self {
            service,
            stop,
            builder: Builder::new(TokioExecutor::new()),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Run the accept loop.
    ///
    /// Returns a [`Drain`] once `stop` fires; the listener is closed by then.
    /// On a fatal accept error every in-flight connection is aborted and
    /// awaited before the error is returned.
    pub async fn serve<A: Accept>(self, listener: A) -> Result<Drain, ServeError> {
        let address = listener.local_addr();
        tracing::info!(address = %address, "HTTP server starting");

        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        let mut failures = 0u32;

        loop {
            tokio::select! {
                biased;

                () = self.stop.cancelled() => break,

                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Connection task panicked");
                        }
                    }
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        failures = 0;
                        self.spawn_connection(stream, peer_addr, &graceful, &mut connections);
                    }
                    Err(e) if is_transient_accept_error(&e) => {
                        failures = failures.saturating_add(1);
                        let delay = accept_backoff(failures);
                        tracing::warn!(error = %e, delay = ?delay, "Transient accept error, backing off");

                        let stopped = tokio::select! {
                            () = self.stop.cancelled() => true,
                            () = tokio::time::sleep(delay) => false,
                        };
                        if stopped {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(address = %address, error = %e, "Accept failed, stopping server");
                        drop(listener);
                        abort_all(&mut connections).await;
                        return Err(ServeError::Accept(e));
                    }
                },
            }
        }

        drop(listener);
        tracing::info!(address = %address, in_flight = self.tracker.active_count(), "HTTP server stopped accepting");

        Ok(Drain {
            graceful,
            connections,
            tracker: self.tracker,
        })
    }

    fn spawn_connection(
        &self,
        stream: TcpStream,
        peer_addr: std::net::SocketAddr,
        graceful: &GracefulShutdown,
        connections: &mut JoinSet<()>,
    ) {
        let guard = self.tracker.track();
        let service = TowerToHyperService::new(self.service.clone());
        let conn = self
            .builder
            .serve_connection_with_upgrades(TokioIo::new(stream), service)
            .into_owned();
        let conn = graceful.watch(conn);

        tracing::debug!(
            connection_id = %guard.id(),
            peer_addr = %peer_addr,
            "Serving connection"
        );

        connections.spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(
                    connection_id = %guard.id(),
                    peer_addr = %peer_addr,
                    error = %e,
                    "Connection ended with error"
                );
            }
            drop(guard);
        });
    }
}

/// In-flight connections left behind by a stopped accept loop.
pub struct Drain {
    graceful: GracefulShutdown,
    connections: JoinSet<()>,
    tracker: ConnectionTracker,
}

impl Drain {
    /// Connections still being served.
    pub fn in_flight(&self) -> usize {
        self.tracker.active_count()
    }

    /// Let in-flight requests finish, closing whatever is left after `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), ShutdownError> {
        let Drain {
            graceful,
            mut connections,
            tracker,
        } = self;

        tracing::info!(
            in_flight = tracker.active_count(),
            timeout = ?timeout,
            "Draining connections"
        );

        match tokio::time::timeout(timeout, graceful.shutdown()).await {
            Ok(()) => {
                while connections.join_next().await.is_some() {}
                metrics::record_shutdown("graceful");
                tracing::info!("All connections drained");
                Ok(())
            }
            Err(_) => {
                let remaining = tracker.active_count();
                tracing::warn!(
                    remaining,
                    timeout = ?timeout,
                    "Drain timeout exceeded, closing remaining connections"
                );
                abort_all(&mut connections).await;
                metrics::record_shutdown("forced");
                Err(ShutdownError::Forced { remaining, timeout })
            }
        }
    }
}

async fn abort_all(connections: &mut JoinSet<()>) {
    connections.abort_all();
    while connections.join_next().await.is_some() {}
}
