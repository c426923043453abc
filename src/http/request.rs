//! Request descriptor: the shape of a logical request.

use crate::base::payload::Payload;
use crate::http::requestkey::request_key;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{Extensions, HeaderMap, Method};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// MIME type that switches the body to `key=value&...` encoding.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Structured data, sent as JSON.
    Json(Payload),
    /// Already url-encoded form data.
    Form(String),
    /// Raw text.
    Text(String),
}

impl Body {
    /// Text used for the request fingerprint.
    pub fn fingerprint(&self) -> String {
        match self {
            Body::Json(payload) => payload.to_json_string(),
            Body::Form(s) | Body::Text(s) => s.clone(),
        }
    }

    /// The structured payload, if this is a JSON body.
    pub fn as_payload(&self) -> Option<&Payload> {
        match self {
            Body::Json(payload) => Some(payload),
            _ => None,
        }
    }
}

impl From<Payload> for Body {
    fn from(payload: Payload) -> Self {
        Body::Json(payload)
    }
}

/// A logical HTTP request as seen by the client and its plugins.
///
/// The request key is attached by the client at dispatch time; plugins read it
/// through [`RequestDescriptor::key`].
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    params: Option<Payload>,
    body: Option<Body>,
    headers: HeaderMap,
    timeout: Option<Duration>,
    silent: Option<bool>,
    signal: Option<CancellationToken>,
    key: Option<String>,
    extensions: Extensions,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: None,
            body: None,
            headers: HeaderMap::new(),
            timeout: None,
            silent: None,
            signal: None,
            key: None,
            extensions: Extensions::new(),
        }
    }

    /// Set query parameters.
    #[must_use]
    pub fn with_params(mut self, params: impl Into<Payload>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        if let (Ok(k), Ok(v)) = (key.try_into(), value.try_into()) {
            self.headers.insert(k, v);
        }
        self
    }

    /// Override the transport timeout for this request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Supply an external cancellation token. The client will not register
    /// its own handle for this request.
    #[must_use]
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn params(&self) -> Option<&Payload> {
        self.params.as_ref()
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Per-call silent flag; `None` lets plugins apply their own default.
    pub fn silent(&self) -> Option<bool> {
        self.silent
    }

    pub fn signal(&self) -> Option<&CancellationToken> {
        self.signal.as_ref()
    }

    /// Request key attached at dispatch, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Typed scratch space for plugins.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn set_body(&mut self, body: Option<Body>) {
        self.body = body;
    }

    pub fn set_params(&mut self, params: Option<Payload>) {
        self.params = params;
    }

    pub fn set_silent(&mut self, silent: Option<bool>) {
        self.silent = silent;
    }

    pub fn set_signal(&mut self, signal: Option<CancellationToken>) {
        self.signal = signal;
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
    }

    /// Fingerprint derived from method, url, params and body.
    pub fn fingerprint(&self) -> String {
        request_key(self)
    }

    /// Content type declared on this request, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
    }

    /// True when the body should be sent url-encoded.
    pub fn is_form_encoded(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.contains(FORM_URLENCODED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let req = RequestDescriptor::new(Method::POST, "/users")
            .with_params(Payload::object([("page", 1i64)]))
            .with_body(Payload::from(json!({"name": "ann"})))
            .with_header("X-Trace", "abc")
            .with_timeout(Duration::from_secs(2));

        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.url(), "/users");
        assert_eq!(req.headers().get("x-trace").unwrap(), "abc");
        assert_eq!(req.timeout(), Some(Duration::from_secs(2)));
        assert!(req.key().is_none());
        assert!(req.signal().is_none());
    }

    #[test]
    fn test_invalid_header_ignored() {
        let req = RequestDescriptor::new(Method::GET, "/").with_header("bad header", "v");
        assert!(req.headers().is_empty());
    }

    #[test]
    fn test_form_detection_is_case_insensitive() {
        let req = RequestDescriptor::new(Method::POST, "/login")
            .with_header("Content-Type", "Application/X-WWW-Form-Urlencoded; charset=UTF-8");
        assert!(req.is_form_encoded());

        let json = RequestDescriptor::new(Method::POST, "/login")
            .with_header("Content-Type", "application/json");
        assert!(!json.is_form_encoded());
    }

    #[test]
    fn test_body_fingerprint() {
        assert_eq!(Body::Text("raw".into()).fingerprint(), "raw");
        assert_eq!(Body::Form("a=1&b=2".into()).fingerprint(), "a=1&b=2");
        assert_eq!(
            Body::Json(Payload::from(json!({"b": 1, "a": 2}))).fingerprint(),
            r#"{"b":1,"a":2}"#
        );
    }
}
