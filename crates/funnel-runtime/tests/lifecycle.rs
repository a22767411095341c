//! Runtime lifecycle over a real socket.

#![cfg(feature = "http-server")]

use std::net::SocketAddr;
use std::time::Duration;

use funnel_framework::{Failure, deferred, direct};
use funnel_runtime::{FunnelConfig, FunnelRuntime, RuntimeError};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn config() -> FunnelConfig {
    let mut config = FunnelConfig::default();
    config.server.port = free_port();
    config.pipeline.default_timeout_ms = 100;
    config
}

async fn get(addr: SocketAddr, path: &str) -> (u16, Value) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    let status = raw.split_whitespace().nth(1).unwrap().parse().unwrap();
    let (_, body) = raw.split_once("\r\n\r\n").unwrap();
    (status, serde_json::from_str(body).unwrap())
}

fn runtime(config: FunnelConfig) -> FunnelRuntime {
    FunnelRuntime::builder()
        .config(config)
        .with_logging(false)
        .get("/sync-test", direct(|_, _| Err(Failure::new("boom"))))
        .get(
            "/hang",
            deferred(|_, _| async {
                std::future::pending::<()>().await;
                Ok(())
            }),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_start_serve_shutdown() {
    let runtime = runtime(config());

    let addr = runtime.start().await.unwrap();
    assert!(runtime.is_serving());
    assert_eq!(runtime.local_addr(), Some(addr));

    let (status, body) = get(addr, "/sync-test").await;
    assert_eq!(status, 500);
    assert_eq!(body, json!({ "error": "boom" }));

    let (status, body) = get(addr, "/missing").await;
    assert_eq!(status, 404);
    assert_eq!(body, json!({ "error": "not found" }));

    runtime.shutdown().await.unwrap();
    assert!(!runtime.is_serving());
}

#[tokio::test]
async fn test_configured_default_timeout_over_http() {
    let runtime = runtime(config());
    let addr = runtime.start().await.unwrap();

    let (status, body) = get(addr, "/hang").await;

    assert_eq!(status, 504);
    assert_eq!(
        body,
        json!({ "error": "deferred operation did not complete within 100 ms" })
    );
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_double_start_is_rejected() {
    let runtime = runtime(config());
    let addr = runtime.start().await.unwrap();

    assert!(matches!(
        runtime.start().await,
        Err(RuntimeError::AlreadyServing(existing)) if existing == addr
    ));
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_serve_until_signal() {
    let config = config();
    let port = config.server.port;
    let runtime = runtime(config);
    let (tx, rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        runtime
            .serve_until(async {
                let _ = rx.await;
            })
            .await
    });

    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let mut connected = false;
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            connected = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(connected);

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
