//! Transport abstraction.
//!
//! The client never speaks HTTP itself. It resolves a [`RequestDescriptor`]
//! into a [`TransportRequest`] and hands it to a [`Transport`]. Implementations
//! should stop work when the request's cancellation token fires; the client
//! also races every call against the token, so a transport that ignores it is
//! still abandoned promptly.
//!
//! [`RequestDescriptor`]: crate::http::request::RequestDescriptor

use crate::base::error::ErrorKind;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A fully resolved request ready for the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Absolute URL with query parameters applied.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub timeout: Option<Duration>,
    pub signal: CancellationToken,
}

/// Raw response as returned by the transport, before status validation.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// JSON response with the given status.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status, value.to_string());
        response.headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        response
    }
}

/// Alias for the `Future` returned by a transport.
pub type Sending = BoxFuture<'static, Result<TransportResponse, ErrorKind>>;

/// Issues requests on behalf of the client.
///
/// Errors are classified: `Network` when no response arrived, `Timeout` when
/// the transport's own deadline passed, `Cancelled` when the signal fired.
/// Any received response, whatever its status, is `Ok`.
pub trait Transport: Send + Sync {
    fn send(&self, request: TransportRequest) -> Sending;
}
