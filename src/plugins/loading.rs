//! Loading-state plugin.
//!
//! Calls `on_change(key, true)` when a request is dispatched and
//! `on_change(key, false)` when it completes, successfully or not. Requests
//! without an attached key are ignored.

use crate::plugins::Plugin;
use std::sync::Arc;

/// Loading callback: `(request key, active)`.
pub type LoadingCallback = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Build the loading plugin.
pub fn loading_plugin<F>(on_change: F) -> Plugin
where
    F: Fn(&str, bool) + Send + Sync + 'static,
{
    let on_change: LoadingCallback = Arc::new(on_change);
    let on_request = on_change.clone();
    let on_response = on_change.clone();
    let on_error = on_change;

    Plugin::new("loading")
        .on_request(move |req| {
            if let Some(key) = req.key() {
                on_request(key, true);
            }
            None
        })
        .on_response(move |res| {
            if let Some(key) = res.request().key() {
                on_response(key, false);
            }
            None
        })
        .on_error(move |err| {
            if let Some(key) = err.request().and_then(|r| r.key()) {
                on_error(key, false);
            }
            None
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::error::{ErrorKind, RequestError};
    use crate::http::request::RequestDescriptor;
    use crate::http::response::Response;
    use crate::plugins::PluginChain;
    use http::{HeaderMap, Method, StatusCode};
    use serde_json::Value;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<(String, bool)>>>, PluginChain) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let chain = PluginChain::new();
        chain.push(loading_plugin(move |key, active| {
            sink.lock().unwrap().push((key.to_string(), active));
        }));
        (calls, chain)
    }

    fn keyed() -> RequestDescriptor {
        let mut req = RequestDescriptor::new(Method::GET, "/users");
        req.set_key("GET|/users||");
        req
    }

    #[test]
    fn test_balanced_on_success() {
        let (calls, chain) = recorder();
        let req = chain.run_request(keyed());
        chain.run_response(Response::new(StatusCode::OK, HeaderMap::new(), Value::Null, req));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![("GET|/users||".to_string(), true), ("GET|/users||".to_string(), false)]
        );
    }

    #[test]
    fn test_balanced_on_error() {
        let (calls, chain) = recorder();
        let req = chain.run_request(keyed());
        chain.run_error(RequestError::new(ErrorKind::Timeout).with_request(req));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.iter().map(|(_, a)| *a).collect::<Vec<_>>(), vec![true, false]);
    }

    #[test]
    fn test_unkeyed_request_ignored() {
        let (calls, chain) = recorder();
        chain.run_request(RequestDescriptor::new(Method::GET, "/x"));
        assert!(calls.lock().unwrap().is_empty());
    }
}
