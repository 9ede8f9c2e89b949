//! End-to-end lifecycle tests for the receiver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use message_receiver::lifecycle::ShutdownError;
use message_receiver::observability::propagation::{B3, TRACEPARENT};
use message_receiver::{ListenContext, Receiver, ReceiverError, ReceiverState, RequestTraceExt};
use tokio::sync::Notify;

mod common;

fn ok_router() -> Router {
    Router::new().route("/ns/broker", post(|| async { "ok" }))
}

/// Router whose handler signals `started` and then sleeps for `delay`.
fn slow_router(started: Arc<Notify>, delay: Duration) -> Router {
    Router::new().route(
        "/ns/broker",
        post(move || {
            let started = started.clone();
            async move {
                started.notify_one();
                tokio::time::sleep(delay).await;
                "done"
            }
        }),
    )
}

#[tokio::test]
async fn cancel_releases_port() {
    let receiver = Arc::new(Receiver::new(0));
    let ctx = ListenContext::default();

    let handle = common::spawn_receiver(receiver.clone(), ctx.clone(), ok_router());
    let addr = common::wait_until_serving(&receiver).await;

    ctx.cancel();
    common::join_receiver(handle, Duration::from_secs(5)).await.unwrap();

    assert_eq!(receiver.state(), ReceiverState::Stopped);
    assert!(receiver.local_addr().is_none());

    // Socket is closed: the port can be bound again.
    tokio::net::TcpListener::bind(("0.0.0.0", addr.port()))
        .await
        .expect("port should be free after shutdown");
}

#[tokio::test]
async fn bind_conflict_returns_promptly() {
    let occupied = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let receiver = Receiver::new(port);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        receiver.start_listen(ListenContext::default(), ok_router()),
    )
    .await
    .expect("bind failure must not block");

    match result {
        Err(ReceiverError::Bind(e)) => assert_eq!(e.port(), port),
        other => panic!("expected bind error, got {other:?}"),
    }
}

#[tokio::test]
async fn serves_requests_through_the_decorator() {
    let receiver = Arc::new(Receiver::new(0));
    let ctx = ListenContext::default();

    let handle = common::spawn_receiver(receiver.clone(), ctx.clone(), ok_router());
    let addr = common::wait_until_serving(&receiver).await;

    let client = common::client();
    let res = client.post(common::url(addr, "/ns/broker")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "ok");

    // Routing stays the handler's business.
    let res = client.get(common::url(addr, "/a/b/c")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    ctx.cancel();
    common::join_receiver(handle, Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn in_flight_request_completes_within_budget() {
    let started = Arc::new(Notify::new());
    let receiver = Arc::new(Receiver::new(0));
    let ctx = ListenContext::default().with_shutdown_timeout(Duration::from_secs(5));

    let handler = slow_router(started.clone(), Duration::from_millis(500));
    let handle = common::spawn_receiver(receiver.clone(), ctx.clone(), handler);
    let addr = common::wait_until_serving(&receiver).await;

    let request = tokio::spawn(common::client().post(common::url(addr, "/ns/broker")).send());
    started.notified().await;

    ctx.cancel();
    common::join_receiver(handle, Duration::from_secs(10)).await.unwrap();

    let res = request.await.unwrap().expect("in-flight request was cut off");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "done");
}

#[tokio::test]
async fn drain_timeout_forces_connections_closed() {
    let started = Arc::new(Notify::new());
    let receiver = Arc::new(Receiver::new(0));
    let budget = Duration::from_millis(200);
    let ctx = ListenContext::default().with_shutdown_timeout(budget);

    let handler = slow_router(started.clone(), Duration::from_secs(30));
    let handle = common::spawn_receiver(receiver.clone(), ctx.clone(), handler);
    let addr = common::wait_until_serving(&receiver).await;

    let request = tokio::spawn(common::client().post(common::url(addr, "/ns/broker")).send());
    started.notified().await;

    let cancelled_at = Instant::now();
    ctx.cancel();
    let result = common::join_receiver(handle, Duration::from_secs(5)).await;
    assert!(cancelled_at.elapsed() < Duration::from_secs(3));

    match result {
        Err(ReceiverError::Shutdown(ShutdownError::Forced { remaining, timeout })) => {
            assert_eq!(remaining, 1);
            assert_eq!(timeout, budget);
        }
        other => panic!("expected forced shutdown, got {other:?}"),
    }

    // The client sees its connection dropped.
    let outcome = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .expect("client should observe the closed connection")
        .unwrap();
    assert!(outcome.is_err());
}

#[tokio::test]
async fn sequential_calls_rebind_independently() {
    let receiver = Arc::new(Receiver::new(0));

    for round in 0..2 {
        let ctx = ListenContext::default();
        let handle = common::spawn_receiver(receiver.clone(), ctx.clone(), ok_router());
        let addr = common::wait_until_serving(&receiver).await;

        let res = common::client()
            .post(common::url(addr, "/ns/broker"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "round {round}");

        ctx.cancel();
        common::join_receiver(handle, Duration::from_secs(5)).await.unwrap();
        assert_eq!(receiver.state(), ReceiverState::Stopped);
    }
}

#[tokio::test]
async fn handler_receives_inbound_trace_context() {
    let router = Router::new().route(
        "/ns/broker",
        get(|request: Request| async move {
            request
                .trace_context()
                .and_then(|ctx| ctx.trace_id())
                .map(|id| id.to_string())
                .unwrap_or_default()
        }),
    );

    let receiver = Arc::new(Receiver::new(0));
    let ctx = ListenContext::default();
    let handle = common::spawn_receiver(receiver.clone(), ctx.clone(), router);
    let addr = common::wait_until_serving(&receiver).await;
    let client = common::client();

    let trace = "4bf92f3577b34da6a3ce929d0e0e4736";
    let res = client
        .get(common::url(addr, "/ns/broker"))
        .header(TRACEPARENT, format!("00-{trace}-00f067aa0ba902b7-01"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), trace);

    let b3_trace = "80f198ee56343ba864fe8b2a57d3eff7";
    let res = client
        .get(common::url(addr, "/ns/broker"))
        .header(B3, format!("{b3_trace}-e457b5a2e4d86bd1-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), b3_trace);

    ctx.cancel();
    common::join_receiver(handle, Duration::from_secs(5)).await.unwrap();
}
