//! Request fingerprints.
//!
//! A request key is `METHOD|url|params|body`. Two requests with the same key
//! are the same logical request for cancellation and caching. Params and body
//! are rendered as compact JSON in key insertion order; text and form bodies
//! are used verbatim; missing parts render as the empty string.

use crate::http::request::RequestDescriptor;

/// Derive the fingerprint of a request.
pub fn request_key(request: &RequestDescriptor) -> String {
    let method = request.method().as_str().to_ascii_uppercase();
    let params = request
        .params()
        .filter(|p| !p.is_null())
        .map(|p| p.to_json_string())
        .unwrap_or_default();
    let body = request
        .body()
        .map(|b| b.fingerprint())
        .unwrap_or_default();

    [method.as_str(), request.url(), params.as_str(), body.as_str()].join("|")
}
