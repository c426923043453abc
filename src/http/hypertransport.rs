//! Default transport over hyper's pooled client.
//!
//! Speaks plain HTTP. TLS is not wired in; plug a custom [`Transport`] for
//! `https` endpoints.

use crate::base::error::ErrorKind;
use crate::http::transport::{Sending, Transport, TransportRequest, TransportResponse};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// [`Transport`] backed by `hyper_util`'s legacy client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Option<Duration>,
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport {
    /// Create a transport with no default timeout.
    pub fn new() -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            timeout: None,
        }
    }

    /// Create a transport whose requests time out after `timeout` unless the
    /// request carries its own deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new()
        }
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: TransportRequest) -> Sending {
        let client = self.client.clone();
        let timeout = request.timeout.or(self.timeout);
        Box::pin(async move {
            let signal = request.signal.clone();
            tokio::select! {
                biased;
                _ = signal.cancelled() => Err(ErrorKind::Cancelled),
                result = execute_with_timeout(client, request, timeout) => result,
            }
        })
    }
}

async fn execute_with_timeout(
    client: Client<HttpConnector, Full<Bytes>>,
    request: TransportRequest,
    timeout: Option<Duration>,
) -> Result<TransportResponse, ErrorKind> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, execute(client, request))
            .await
            .map_err(|_| ErrorKind::Timeout)?,
        None => execute(client, request).await,
    }
}

async fn execute(
    client: Client<HttpConnector, Full<Bytes>>,
    request: TransportRequest,
) -> Result<TransportResponse, ErrorKind> {
    let mut builder = http::Request::builder()
        .method(request.method)
        .uri(request.url.as_str());
    if let Some(headers) = builder.headers_mut() {
        headers.extend(request.headers);
    }
    let req = builder
        .body(Full::new(request.body))
        .map_err(|e| ErrorKind::InvalidRequest(e.to_string()))?;

    tracing::trace!(uri = %req.uri(), method = %req.method(), "hyper transport sending");

    let response = client.request(req).await.map_err(classify)?;
    let (parts, body) = response.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| ErrorKind::Network(e.to_string()))?
        .to_bytes();

    Ok(TransportResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}

/// Connection-level failures mean no response was received.
fn classify(err: hyper_util::client::legacy::Error) -> ErrorKind {
    if err.is_connect() {
        return ErrorKind::Network(err.to_string());
    }
    let hyper_failure = std::error::Error::source(&err)
        .and_then(|source| source.downcast_ref::<hyper::Error>());
    match hyper_failure {
        Some(e) if e.is_closed() || e.is_incomplete_message() || e.is_canceled() => {
            ErrorKind::Network(e.to_string())
        }
        _ => ErrorKind::Other(err.to_string()),
    }
}
