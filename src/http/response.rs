//! Response as seen by the client and its plugins.

use crate::http::request::RequestDescriptor;
use crate::http::transport::TransportResponse;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::Value;

/// A validated response with its body decoded.
///
/// The body is parsed as JSON when possible; otherwise it is kept as a JSON
/// string of the (lossily decoded) text. An empty body is `null`.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
    request: RequestDescriptor,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Value, request: RequestDescriptor) -> Self {
        Self {
            status,
            headers,
            body,
            request,
        }
    }

    /// Build from a transport response, decoding the body.
    pub fn from_transport(raw: TransportResponse, request: RequestDescriptor) -> Self {
        let body = decode_body(&raw.body);
        Self::new(raw.status, raw.headers, body, request)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    /// The request that produced this response.
    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }
}

/// Decode a body: JSON if it parses, text otherwise, null when empty.
pub fn decode_body(bytes: &Bytes) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
