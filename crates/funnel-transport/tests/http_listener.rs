//! HTTP listener tests over a loopback socket.

#![cfg(feature = "http-server")]

use std::net::SocketAddr;

use funnel_core::Failure;
use funnel_framework::{Dispatcher, deferred, direct};
use funnel_transport::{HttpServer, Listener, ListenerHandle};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

struct RawResponse {
    status: u16,
    headers: String,
    body: String,
}

impl RawResponse {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

async fn send(addr: SocketAddr, method: &str, path: &str, body: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let (status_line, headers) = head.split_once("\r\n").unwrap_or((head, ""));
    let status = status_line.split_whitespace().nth(1).unwrap().parse().unwrap();

    RawResponse {
        status,
        headers: headers.to_ascii_lowercase(),
        body: body.to_string(),
    }
}

async fn start(server: HttpServer) -> ListenerHandle {
    let dispatcher = Dispatcher::builder()
        .get("/sync-test", direct(|_, _| Err(Failure::new("boom"))))
        .get(
            "/async-test-3",
            deferred(|_, res| async move {
                tokio::task::yield_now().await;
                Err::<(), _>(Failure::new("Async Fn error!"))?;
                res.json(json!({ "well": "unreachable" }))
            }),
        )
        .post(
            "/echo",
            direct(|req, res| {
                let value: Value = req.json()?;
                res.json(value)
            }),
        )
        .request_log(false)
        .build();

    server.listen("127.0.0.1:0", dispatcher).await.unwrap()
}

#[tokio::test]
async fn test_sync_fault_over_http() {
    let handle = start(HttpServer::new()).await;

    let response = send(handle.local_addr(), "GET", "/sync-test", "").await;

    assert_eq!(response.status, 500);
    assert!(response.headers.contains("content-type: application/json"));
    assert_eq!(response.json(), json!({ "error": "boom" }));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deferred_fault_over_http() {
    let handle = start(HttpServer::new()).await;

    let response = send(handle.local_addr(), "GET", "/async-test-3", "").await;

    assert_eq!(response.status, 500);
    assert_eq!(response.json(), json!({ "error": "Async Fn error!" }));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_route_over_http() {
    let handle = start(HttpServer::new()).await;

    let response = send(handle.local_addr(), "GET", "/missing", "").await;

    assert_eq!(response.status, 404);
    assert_eq!(response.json(), json!({ "error": "not found" }));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_json_body_round_trip() {
    let handle = start(HttpServer::new()).await;

    let response = send(handle.local_addr(), "POST", "/echo", r#"{"name":"funnel"}"#).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.json(), json!({ "name": "funnel" }));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let handle = start(HttpServer::new().with_max_body_bytes(8)).await;

    let response = send(
        handle.local_addr(),
        "POST",
        "/echo",
        r#"{"name":"much too long for the limit"}"#,
    )
    .await;

    assert_eq!(response.status, 413);
    assert_eq!(response.json(), json!({ "error": "payload too large" }));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_truncated_body_is_bad_request() {
    let handle = start(HttpServer::new()).await;
    let addr = handle.local_addr();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "POST /echo HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: 100\r\nConnection: close\r\n\r\nhello"
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();

    assert!(head.starts_with("HTTP/1.1 400"));
    assert_eq!(
        serde_json::from_str::<Value>(body).unwrap(),
        json!({ "error": "failed to read request body" })
    );

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_releases_listener() {
    let handle = start(HttpServer::new()).await;
    let addr = handle.local_addr();
    let token = handle.shutdown_token();

    handle.shutdown().await.unwrap();

    assert!(token.is_cancelled());
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_bind_error() {
    let first = start(HttpServer::new()).await;
    let taken = first.local_addr().to_string();

    let result = HttpServer::new()
        .listen(&taken, Dispatcher::builder().build())
        .await;

    assert!(matches!(
        result,
        Err(funnel_transport::TransportError::Bind { .. })
    ));
    first.shutdown().await.unwrap();
}
