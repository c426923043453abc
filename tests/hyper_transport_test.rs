//! Tests for the hyper-backed transport against local servers.

mod common;

use common::{start_backend, start_echo_backend, start_silent_backend};
use requestkit::http::transport::{Transport, TransportRequest};
use requestkit::http::HyperTransport;
use requestkit::{Client, ErrorKind, RequestDescriptor, RequestExtras};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

fn client_for(addr: std::net::SocketAddr) -> Client {
    Client::builder()
        .base_url(Url::parse(&format!("http://{addr}")).unwrap())
        .build()
}

#[tokio::test]
async fn test_get_json() {
    let addr = start_backend("200 OK", r#"{"id":1,"name":"ann"}"#).await;
    let client = client_for(addr);

    let res = client.get("/users/1").await.unwrap();
    assert_eq!(res.status(), http::StatusCode::OK);
    assert_eq!(res.body(), &json!({"id": 1, "name": "ann"}));
}

#[tokio::test]
async fn test_status_error_carries_body() {
    let addr = start_backend("404 Not Found", r#"{"message":"no such user"}"#).await;
    let client = client_for(addr);

    let err = client.get("/users/404").await.unwrap_err();
    assert_eq!(err.status(), Some(http::StatusCode::NOT_FOUND));
    assert_eq!(err.response_body(), Some(&json!({"message": "no such user"})));
}

#[tokio::test]
async fn test_request_line_and_headers_on_the_wire() {
    let addr = start_echo_backend().await;
    let client = Client::builder()
        .base_url(Url::parse(&format!("http://{addr}")).unwrap())
        .header("X-App", "requestkit")
        .build();

    let req = RequestDescriptor::new(http::Method::GET, "/search")
        .with_params(json!({"q": "rust lang"}));
    let res = client.request(req, RequestExtras::default()).await.unwrap();

    let echoed = res.body().as_str().unwrap().to_ascii_lowercase();
    assert!(echoed.starts_with("get /search?q=rust+lang http/1.1"));
    assert!(echoed.contains("x-app: requestkit"));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr).get("/").await.unwrap_err();
    assert!(err.is_network(), "unexpected error: {err:?}");
    assert_eq!(err.code(), "ERR_NETWORK");
}

#[tokio::test]
async fn test_timeout() {
    common::init_tracing();
    let addr = start_silent_backend().await;
    let client = Client::builder()
        .base_url(Url::parse(&format!("http://{addr}")).unwrap())
        .timeout(Duration::from_millis(100))
        .build();

    let err = client.get("/hang").await.unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::Timeout);
    assert_eq!(err.code(), "ECONNABORTED");
}

#[tokio::test]
async fn test_transport_honours_signal() {
    let addr = start_silent_backend().await;
    let transport = HyperTransport::new();
    let signal = CancellationToken::new();

    let request = TransportRequest {
        method: http::Method::GET,
        url: Url::parse(&format!("http://{addr}/hang")).unwrap(),
        headers: http::HeaderMap::new(),
        body: bytes::Bytes::new(),
        timeout: None,
        signal: signal.clone(),
    };
    let sending = tokio::spawn(transport.send(request));
    tokio::time::sleep(Duration::from_millis(50)).await;
    signal.cancel();

    let outcome = sending.await.unwrap();
    assert!(matches!(outcome, Err(ErrorKind::Cancelled)));
}

#[tokio::test]
async fn test_transport_default_timeout() {
    let addr = start_silent_backend().await;
    let transport = HyperTransport::with_timeout(Duration::from_millis(50));

    let request = TransportRequest {
        method: http::Method::GET,
        url: Url::parse(&format!("http://{addr}/hang")).unwrap(),
        headers: http::HeaderMap::new(),
        body: bytes::Bytes::new(),
        timeout: None,
        signal: CancellationToken::new(),
    };
    assert!(matches!(transport.send(request).await, Err(ErrorKind::Timeout)));
}
