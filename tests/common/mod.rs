//! Shared utilities for integration tests.

#![allow(dead_code)]

use requestkit::http::transport::{Sending, Transport, TransportRequest, TransportResponse};
use requestkit::{Client, ErrorKind};
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub struct Reply {
    pub delay: Duration,
    pub outcome: Result<TransportResponse, ErrorKind>,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        let status = http::StatusCode::from_u16(status).unwrap();
        Self {
            delay: Duration::ZERO,
            outcome: Ok(TransportResponse::json(status, &body)),
        }
    }

    pub fn error(kind: ErrorKind) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(kind),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct MockState {
    script: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    requests: Mutex<Vec<TransportRequest>>,
    calls: AtomicUsize,
}

/// Transport that plays back scripted replies and records what it was sent.
///
/// Queued replies are used first, then the fallback (default: `200 null`).
/// Delayed replies honour the request's cancellation token.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply used once the queue is empty.
    pub fn always(reply: Reply) -> Self {
        let mock = Self::new();
        *mock.state.fallback.lock().unwrap() = Some(reply);
        mock
    }

    pub fn push(&self, reply: Reply) -> &Self {
        self.state.script.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Reply {
        if let Some(reply) = self.state.script.lock().unwrap().pop_front() {
            return reply;
        }
        self.state
            .fallback
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Reply::json(200, Value::Null))
    }
}

impl Transport for MockTransport {
    fn send(&self, request: TransportRequest) -> Sending {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.requests.lock().unwrap().push(request.clone());
        let reply = self.next_reply();
        Box::pin(async move {
            if !reply.delay.is_zero() {
                tokio::select! {
                    _ = request.signal.cancelled() => return Err(ErrorKind::Cancelled),
                    _ = tokio::time::sleep(reply.delay) => {}
                }
            }
            reply.outcome
        })
    }
}

/// Route `tracing` output to the test harness. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Client over `mock` with base URL `http://mock.local`.
pub fn client(mock: &MockTransport) -> Client {
    Client::builder()
        .base_url("http://mock.local".parse().unwrap())
        .transport(mock.clone())
        .build()
}

/// Yield until `key` shows up in the client's registry.
pub async fn wait_in_flight(client: &Client, key: &str) {
    while !client.is_in_flight(key) {
        tokio::task::yield_now().await;
    }
}

/// Start a local HTTP/1.1 server answering every request with `status` and
/// `body`. Returns its address.
pub async fn start_backend(status_line: &'static str, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a server that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// Start a server that echoes the request line and headers back as the body.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).into_owned();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    request.len(),
                    request
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
