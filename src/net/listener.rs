//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind the configured port on all interfaces
//! - Accept incoming TCP connections
//! - Surface bind failures immediately (never retried here)

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

/// Failure to acquire the listening socket.
#[derive(Debug, Error)]
#[error("Failed to bind port {port}: {source}")]
pub struct BindError {
    port: u16,
    #[source]
    source: io::Error,
}

impl BindError {
    /// The port that could not be bound.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The underlying OS error kind (e.g. `AddrInUse`, `PermissionDenied`).
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// A bound, listening TCP socket.
///
/// The socket is closed when the `Listener` is dropped.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind `0.0.0.0:<port>`. Port 0 requests an ephemeral port from the OS.
    pub async fn bind(port: u16) -> Result<Self, BindError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| BindError { port, source })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| BindError { port, source })?;

        tracing::info!(
            port,
            address = %local_addr,
            "Listener bound"
        );

        Ok(Self { inner, local_addr })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer_addr) = self.inner.accept().await?;

        tracing::trace!(peer_addr = %peer_addr, "Connection accepted");

        Ok((stream, peer_addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Source of inbound connections for the HTTP accept loop.
pub trait Accept: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;

    fn local_addr(&self) -> SocketAddr;
}

impl Accept for Listener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        Listener::accept(self)
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        tracing::debug!(address = %self.local_addr, "Listener closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_ephemeral_port() {
        let listener = Listener::bind(0).await.unwrap();
        assert_ne!(listener.local_addr().port(), 0);
        assert!(listener.local_addr().ip().is_unspecified());
    }

    #[tokio::test]
    async fn bind_port_in_use_fails() {
        let first = Listener::bind(0).await.unwrap();
        let port = first.local_addr().port();

        let err = Listener::bind(port).await.unwrap_err();
        assert_eq!(err.port(), port);
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }

    #[tokio::test]
    async fn drop_releases_port() {
        let first = Listener::bind(0).await.unwrap();
        let port = first.local_addr().port();
        drop(first);

        let again = Listener::bind(port).await.unwrap();
        assert_eq!(again.local_addr().port(), port);
    }
}
