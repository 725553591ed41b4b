//! Integration tests for the board stream over a real HTTP connection.
//!
//! Uses a mock hyper HTTP server to emit SSE-framed envelopes, verifying the
//! full connection → parse → validate → callback pipeline.

use std::{convert::Infallible, net::SocketAddr, time::Duration};

use board_stream::{BoardCallbacks, BoardStream, StreamConfig};
use http_body_util::Full;
use hyper::{
    Request, Response,
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::{net::TcpListener, sync::mpsc, time::timeout};

// ---------------------------------------------------------------------------
// Mock SSE server helpers
// ---------------------------------------------------------------------------

/// Start a mock SSE server that returns the given body with `text/event-stream`
/// content type. Returns the `SocketAddr` it is listening on.
async fn start_sse_server(body: &'static str) -> SocketAddr {
    start_sse_server_with_options(body, "text/event-stream", 200).await
}

/// Start a mock SSE server with configurable content type and status code.
async fn start_sse_server_with_options(
    body: &'static str,
    content_type: &'static str,
    status: u16,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        // Accept a single connection (sufficient for most tests).
        if let Ok((stream, _)) = listener.accept().await {
            let io = TokioIo::new(stream);
            let _ = http1::Builder::new()
                .serve_connection(
                    io,
                    service_fn(move |_req: Request<Incoming>| {
                        let resp = Response::builder()
                            .status(status)
                            .header("content-type", content_type)
                            .body(Full::new(Bytes::from(body)))
                            .expect("build response");
                        async move { Ok::<_, Infallible>(resp) }
                    }),
                )
                .await;
        }
    });

    addr
}

fn config_for(addr: SocketAddr) -> StreamConfig {
    StreamConfig::new(format!("http://{addr}/api/events"), "proj-1")
        .reconnect_max_attempts(Some(0))
}

// ---------------------------------------------------------------------------
// Event reception and dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_events_dispatch_with_destructured_arguments() {
    let body = "data: {\"type\":\"item-moved\",\"timestamp\":\"2026-08-29T10:00:00Z\",\"data\":{\"itemId\":\"001\",\"fromStage\":\"ready\",\"toStage\":\"testing\"}}\n\n\
                data: {\"type\":\"item-deleted\",\"timestamp\":\"2026-08-29T10:00:01Z\",\"data\":{\"itemId\":\"002\"}}\n\n";
    let addr = start_sse_server(body).await;

    let (moved_tx, mut moved_rx) = mpsc::unbounded_channel();
    let (deleted_tx, mut deleted_rx) = mpsc::unbounded_channel();
    let callbacks = BoardCallbacks::new()
        .on_item_moved(move |id, from, to, item| {
            let _ = moved_tx.send((id, from, to, item));
        })
        .on_item_deleted(move |id| {
            let _ = deleted_tx.send(id);
        });

    let stream = BoardStream::connect(config_for(addr), callbacks)
        .await
        .expect("connect");
    let (_handle, _status) = stream.split();

    let (id, from, to, item): (String, String, String, Option<Value>) =
        timeout(Duration::from_secs(2), moved_rx.recv())
            .await
            .expect("timeout")
            .expect("moved event");
    assert_eq!(id, "001");
    assert_eq!(from, "ready");
    assert_eq!(to, "testing");
    assert!(item.is_none());

    let deleted = timeout(Duration::from_secs(2), deleted_rx.recv())
        .await
        .expect("timeout")
        .expect("deleted event");
    assert_eq!(deleted, "002");
}

#[tokio::test]
async fn test_malformed_and_incomplete_messages_do_not_disturb_stream() {
    // First message is not JSON, second is item-moved missing toStage, third
    // is valid. Only the third may reach a callback.
    let body = "data: not-json-at-all {{{\n\n\
                data: {\"type\":\"item-moved\",\"timestamp\":\"t\",\"data\":{\"itemId\":\"003\",\"fromStage\":\"ready\"}}\n\n\
                data: {\"type\":\"item-deleted\",\"timestamp\":\"t\",\"data\":{\"itemId\":\"004\"}}\n\n";
    let addr = start_sse_server(body).await;

    let (moved_tx, mut moved_rx) = mpsc::unbounded_channel();
    let (deleted_tx, mut deleted_rx) = mpsc::unbounded_channel();
    let callbacks = BoardCallbacks::new()
        .on_item_moved(move |id, from, to, item| {
            let _ = moved_tx.send((id, from, to, item));
        })
        .on_item_deleted(move |id| {
            let _ = deleted_tx.send(id);
        });

    let stream = BoardStream::connect(config_for(addr), callbacks)
        .await
        .expect("connect");
    let (_handle, _status) = stream.split();

    // The valid trailing event arrives, proving the earlier garbage did not
    // tear the connection down.
    let deleted = timeout(Duration::from_secs(2), deleted_rx.recv())
        .await
        .expect("timeout")
        .expect("deleted event");
    assert_eq!(deleted, "004");

    // The incomplete item-moved was dropped silently.
    assert!(moved_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_lifecycle_event_passes_whole_payload() {
    let body = "data: {\"type\":\"mission-completed\",\"timestamp\":\"t\",\"data\":{\"missionId\":\"m-1\",\"status\":\"done\"}}\n\n";
    let addr = start_sse_server(body).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let callbacks = BoardCallbacks::new().on_mission_completed(move |data| {
        let _ = tx.send(data);
    });

    let stream = BoardStream::connect(config_for(addr), callbacks)
        .await
        .expect("connect");
    let (_handle, _status) = stream.split();

    let data = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timeout")
        .expect("event");
    assert_eq!(data["missionId"], "m-1");
    assert_eq!(data["status"], "done");
}

#[tokio::test]
async fn test_project_id_is_sent_as_query_parameter() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    let (uri_tx, mut uri_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let io = TokioIo::new(stream);
            let _ = http1::Builder::new()
                .serve_connection(
                    io,
                    service_fn(move |req: Request<Incoming>| {
                        let _ = uri_tx.send(req.uri().to_string());
                        let resp = Response::builder()
                            .status(200)
                            .header("content-type", "text/event-stream")
                            .body(Full::new(Bytes::from("")))
                            .expect("build response");
                        async move { Ok::<_, Infallible>(resp) }
                    }),
                )
                .await;
        }
    });

    let config = StreamConfig::new(format!("http://{addr}/api/events"), "proj-42")
        .reconnect_max_attempts(Some(0));
    let stream = BoardStream::connect(config, BoardCallbacks::new())
        .await
        .expect("connect");
    let (_handle, _status) = stream.split();

    let uri = timeout(Duration::from_secs(2), uri_rx.recv())
        .await
        .expect("timeout")
        .expect("request uri");
    assert!(uri.contains("projectId=proj-42"), "uri was {uri}");
}

// ---------------------------------------------------------------------------
// Failure surfacing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_non_2xx_status_exhausts_budget_and_surfaces_error() {
    let addr = start_sse_server_with_options("", "text/event-stream", 403).await;

    let stream = BoardStream::connect(config_for(addr), BoardCallbacks::new())
        .await
        .expect("connect");
    let (_handle, mut status) = stream.split();

    let observed = timeout(
        Duration::from_secs(2),
        status.wait_for(|s| s.state.is_error()),
    )
    .await
    .expect("timeout")
    .expect("watch closed")
    .clone();

    let err = observed.error.expect("terminal error");
    assert!(
        err.to_string()
            .contains("failed to connect after maximum retries")
    );
}

#[tokio::test]
async fn test_invalid_content_type_exhausts_budget() {
    let addr = start_sse_server_with_options("data: test\n\n", "application/json", 200).await;

    let stream = BoardStream::connect(config_for(addr), BoardCallbacks::new())
        .await
        .expect("connect");
    let (_handle, mut status) = stream.split();

    let observed = timeout(
        Duration::from_secs(2),
        status.wait_for(|s| s.state.is_error()),
    )
    .await
    .expect("timeout")
    .expect("watch closed")
    .clone();
    assert!(observed.error.is_some());
}

#[tokio::test]
async fn test_connected_then_server_close_surfaces_error_once_budget_spent() {
    let body = "data: {\"type\":\"item-deleted\",\"timestamp\":\"t\",\"data\":{\"itemId\":\"005\"}}\n\n";
    let addr = start_sse_server(body).await;

    let (deleted_tx, mut deleted_rx) = mpsc::unbounded_channel();
    let callbacks = BoardCallbacks::new().on_item_deleted(move |id| {
        let _ = deleted_tx.send(id);
    });

    let stream = BoardStream::connect(config_for(addr), callbacks)
        .await
        .expect("connect");
    let (_handle, mut status) = stream.split();

    // The event arrives while connected.
    let deleted = timeout(Duration::from_secs(2), deleted_rx.recv())
        .await
        .expect("timeout")
        .expect("deleted event");
    assert_eq!(deleted, "005");

    // The server then closes the body; with a zero retry budget the stream
    // goes terminal.
    let observed = timeout(
        Duration::from_secs(2),
        status.wait_for(|s| s.state.is_error()),
    )
    .await
    .expect("timeout")
    .expect("watch closed")
    .clone();
    assert!(observed.error.is_some());
}

// ---------------------------------------------------------------------------
// Graceful close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_handle_close_shuts_down_driver() {
    let body = "data: {\"type\":\"item-deleted\",\"timestamp\":\"t\",\"data\":{\"itemId\":\"006\"}}\n\n";
    let addr = start_sse_server(body).await;

    let (deleted_tx, mut deleted_rx) = mpsc::unbounded_channel();
    let callbacks = BoardCallbacks::new().on_item_deleted(move |id| {
        let _ = deleted_tx.send(id);
    });

    let stream = BoardStream::connect(config_for(addr), callbacks)
        .await
        .expect("connect");
    let (handle, _status) = stream.split();

    let _ = timeout(Duration::from_secs(2), deleted_rx.recv())
        .await
        .expect("timeout");

    handle.close().await.expect("close");

    // The driver exits and drops its command receiver.
    for _ in 0..200 {
        if !handle.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!handle.is_running());
    assert!(!handle.status().is_connected());
}
