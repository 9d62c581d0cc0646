//! 重试请求测试
//!
//! 使用原始TCP服务器模拟传输层故障，使用mockito模拟HTTP响应

use mockito::Matcher;
use serde_json::json;
use service_probe::error::ProbeError;
use service_probe::health::{Backoff, ProbeClient, ProbeRequest, RetryPolicy};
use service_probe::ClientConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

const SCALED_BASE: Duration = Duration::from_millis(50);

fn client(timeout: Duration) -> ProbeClient {
    ProbeClient::new(&ClientConfig {
        request_timeout: timeout,
        ..Default::default()
    })
    .unwrap()
    .with_retry(RetryPolicy::new(0).with_backoff(Backoff::Exponential { base: SCALED_BASE }))
}

/// 前 `failures` 个连接直接关闭，之后返回 200
async fn flaky_server(failures: usize) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                drop(socket);
                continue;
            }
            tokio::spawn(respond_ok(socket));
        }
    });

    (format!("http://{addr}/"), connections)
}

async fn respond_ok(mut socket: TcpStream) {
    let mut buf = [0u8; 4096];
    let _ = socket.read(&mut buf).await;
    let _ = socket
        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
        .await;
    let _ = socket.shutdown().await;
}

/// 返回 200 并把收到的原始请求头发回测试
async fn capture_server() -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut buf = vec![0u8; 8192];
        let n = socket.read(&mut buf).await.unwrap_or(0);
        let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await;
    });

    (format!("http://{addr}/"), rx)
}

/// 接受连接但从不响应
async fn hanging_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{addr}/")
}

async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

#[tokio::test]
async fn test_succeeds_on_third_attempt_with_scaled_backoff() {
    let (url, connections) = flaky_server(2).await;
    let client = client(Duration::from_secs(5));

    let started = Instant::now();
    let outcome = client.get(&url, 2).await.unwrap();

    assert_eq!(outcome.status_code(), 200);
    assert_eq!(outcome.text(), "ok");
    assert_eq!(outcome.attempts, 3);
    assert_eq!(connections.load(Ordering::SeqCst), 3);
    // 50ms + 100ms
    assert!(started.elapsed() >= SCALED_BASE * 3);
}

#[tokio::test]
async fn test_default_backoff_waits_one_then_two_seconds() {
    let (url, _) = flaky_server(2).await;
    let client = client(Duration::from_secs(5)).with_retry(RetryPolicy::new(2));

    let started = Instant::now();
    let outcome = client.get(&url, 2).await.unwrap();

    assert_eq!(outcome.attempts, 3);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(outcome.elapsed >= Duration::from_secs(3));
}

#[tokio::test]
async fn test_transport_error_exhausts_exactly_n_plus_one_attempts() {
    let (url, connections) = flaky_server(usize::MAX).await;
    let client = client(Duration::from_secs(5));

    let err = client.get(&url, 3).await.unwrap_err();

    assert!(matches!(err, ProbeError::Transport { .. }));
    assert_eq!(err.attempts(), Some(4));
    assert_eq!(connections.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_zero_retries_single_attempt() {
    let (url, connections) = flaky_server(usize::MAX).await;
    let client = client(Duration::from_secs(5));

    let err = client.get(&url, 0).await.unwrap_err();

    assert_eq!(err.attempts(), Some(1));
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_refused_is_retried() {
    let url = closed_port_url().await;
    let client = client(Duration::from_secs(2));

    let err = client.get(&url, 2).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.attempts(), Some(3));
}

#[tokio::test]
async fn test_timeout_is_retried_and_reported() {
    let url = hanging_server().await;
    let client = client(Duration::from_millis(100));

    let err = client.get(&url, 1).await.unwrap_err();
    assert!(matches!(err, ProbeError::Timeout { attempts: 2, .. }));
}

#[tokio::test]
async fn test_per_request_timeout_override() {
    let url = hanging_server().await;
    let client = client(Duration::from_secs(30));

    let started = Instant::now();
    let request = ProbeRequest::get(&url)
        .with_timeout(Duration::from_millis(100))
        .with_retry(RetryPolicy::none());
    let err = client.execute(&request).await.unwrap_err();

    assert!(matches!(err, ProbeError::Timeout { attempts: 1, .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_http_500_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/fail")
        .with_status(500)
        .with_body("boom")
        .expect(1)
        .create_async()
        .await;

    // 默认退避从1秒开始，若发生重试耗时必然超过1秒
    let client = client(Duration::from_secs(5)).with_retry(RetryPolicy::new(3));
    let started = Instant::now();
    let outcome = client
        .get(&format!("{}/fail", server.url()), 3)
        .await
        .unwrap();

    assert_eq!(outcome.status_code(), 500);
    assert_eq!(outcome.text(), "boom");
    assert_eq!(outcome.attempts, 1);
    assert!(started.elapsed() < Duration::from_secs(1));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_json_sets_content_type() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/createTask")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"name": "demo", "priorityLevel": 5})))
        .with_status(200)
        .with_body(r#"{"task": {"id": "t-1"}}"#)
        .create_async()
        .await;

    let client = client(Duration::from_secs(5));
    let outcome = client
        .post_json(
            &format!("{}/createTask", server.url()),
            &json!({"name": "demo", "priorityLevel": 5}),
            0,
        )
        .await
        .unwrap();

    let body = outcome.json().unwrap();
    assert_eq!(
        service_probe::health::json::extract_task_id(&body),
        Some("t-1".to_string())
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_put_and_delete_wrappers() {
    let mut server = mockito::Server::new_async().await;
    let put = server
        .mock("PUT", "/task/1")
        .match_header("content-type", "application/json")
        .with_status(200)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/task/1")
        .with_status(204)
        .create_async()
        .await;

    let client = client(Duration::from_secs(5));
    let url = format!("{}/task/1", server.url());

    let outcome = client.put_json(&url, &json!({"status": "done"}), 0).await.unwrap();
    assert_eq!(outcome.status_code(), 200);

    let outcome = client.delete(&url, 0).await.unwrap();
    assert_eq!(outcome.status_code(), 204);
    assert!(outcome.body.is_empty());

    put.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_headers_are_sent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/uid/abc")
        .match_header("X-Internal-API-Key", "secret")
        .match_header("X-Trace", "42")
        .with_status(200)
        .create_async()
        .await;

    let client = client(Duration::from_secs(5)).with_internal_api_key(Some("secret"));
    let mut headers = HashMap::new();
    headers.insert("X-Trace".to_string(), "42".to_string());

    let outcome = client
        .request_with_retry(
            "get",
            &format!("{}/uid/abc", server.url()),
            None,
            &headers,
            0,
        )
        .await
        .unwrap();

    assert_eq!(outcome.status_code(), 200);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_request_header_replaces_default_on_the_wire() {
    let (url, captured) = capture_server().await;
    let client = client(Duration::from_secs(5)).with_internal_api_key(Some("default-key"));

    let request = ProbeRequest::new("POST", &url)
        .with_header("X-Internal-API-Key", "bad-key")
        .with_header("Content-Type", "text/plain")
        .with_json(&json!({"name": "demo"}))
        .unwrap()
        .with_retry(RetryPolicy::none());
    let outcome = client.execute(&request).await.unwrap();
    assert_eq!(outcome.status_code(), 200);

    let raw = captured.await.unwrap().to_ascii_lowercase();
    let values = |name: &str| -> Vec<String> {
        raw.lines()
            .filter_map(|line| line.strip_prefix(name))
            .map(|v| v.trim().to_string())
            .collect()
    };
    assert_eq!(values("x-internal-api-key:"), ["bad-key"]);
    assert_eq!(values("content-type:"), ["application/json"]);
}
