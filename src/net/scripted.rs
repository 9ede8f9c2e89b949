//! Accept source driven by a test instead of a socket.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::net::Accept;

type Accepted = io::Result<(TcpStream, SocketAddr)>;

/// Feeds results to a [`ScriptedAccept`], in order.
pub(crate) struct Script(mpsc::UnboundedSender<Accepted>);

impl Script {
    /// Make the next accept fail with `kind`.
    pub(crate) fn fail(&self, kind: io::ErrorKind) {
        let _ = self.0.send(Err(io::Error::from(kind)));
    }

    /// Open a loopback connection and queue its server side. Returns the
    /// client side.
    pub(crate) async fn connect(&self) -> TcpStream {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let accepted = listener.accept().await.unwrap();
        let _ = self.0.send(Ok(accepted));
        client
    }
}

/// Returns queued results; waits forever once the queue is empty.
pub(crate) struct ScriptedAccept {
    results: Mutex<mpsc::UnboundedReceiver<Accepted>>,
    cancel_on_error: Option<CancellationToken>,
}

impl ScriptedAccept {
    /// Cancel `token` just before an error is handed to the accept loop.
    pub(crate) fn cancel_on_error(mut self, token: CancellationToken) -> Self {
        self.cancel_on_error = Some(token);
        self
    }
}

pub(crate) fn scripted() -> (Script, ScriptedAccept) {
    let (tx, rx) = mpsc::unbounded_channel();
    let accept = ScriptedAccept {
        results: Mutex::new(rx),
        cancel_on_error: None,
    };
    (Script(tx), accept)
}

impl Accept for ScriptedAccept {
    async fn accept(&self) -> Accepted {
        let next = self.results.lock().await.recv().await;
        match next {
            Some(Err(e)) => {
                if let Some(token) = &self.cancel_on_error {
                    token.cancel();
                }
                Err(e)
            }
            Some(accepted) => accepted,
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }
}
