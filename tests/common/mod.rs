//! Shared utilities for receiver integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use message_receiver::{ListenContext, Receiver, ReceiverError, ReceiverState};
use tokio::task::JoinHandle;

/// Run `start_listen` on a background task.
pub fn spawn_receiver(
    receiver: Arc<Receiver>,
    ctx: ListenContext,
    handler: Router,
) -> JoinHandle<Result<(), ReceiverError>> {
    tokio::spawn(async move { receiver.start_listen(ctx, handler).await })
}

/// Wait until the receiver is serving and return the address it bound.
pub async fn wait_until_serving(receiver: &Receiver) -> SocketAddr {
    let mut states = receiver.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|s| *s == ReceiverState::Serving),
    )
    .await
    .expect("receiver did not start serving")
    .expect("state channel closed");

    receiver.local_addr().expect("serving receiver has an address")
}

/// Wait for `start_listen` to return, failing the test if it hangs.
pub async fn join_receiver(
    handle: JoinHandle<Result<(), ReceiverError>>,
    within: Duration,
) -> Result<(), ReceiverError> {
    tokio::time::timeout(within, handle)
        .await
        .expect("start_listen did not return in time")
        .expect("receiver task panicked")
}

/// Loopback URL for a receiver bound on all interfaces.
pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://127.0.0.1:{}{}", addr.port(), path)
}

/// Client that never reuses connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
