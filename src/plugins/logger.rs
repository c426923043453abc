//! Request logger plugin.
//!
//! Stamps each request with its start time and, on completion, appends a
//! [`RequestLog`] to a [`DebugStore`] and emits it as a `tracing` event. The
//! store can back a debug panel.
//!
//! Whether the plugin records anything is decided once, at construction.

use crate::config::Environment;
use crate::http::request::{Body, RequestDescriptor};
use crate::plugins::Plugin;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use time::OffsetDateTime;
use tokio::time::Instant;

/// Start time marker stored in request extensions.
#[derive(Debug, Clone, Copy)]
pub struct StartedAt(pub Instant);

/// One completed request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLog {
    pub method: String,
    pub url: String,
    pub params: Option<Value>,
    pub body: Option<Value>,
    pub status: Option<u16>,
    pub ok: bool,
    pub duration_ms: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub response: Option<Value>,
    pub error: Option<String>,
}

/// Append-only log store.
#[derive(Debug, Clone, Default)]
pub struct DebugStore {
    logs: Arc<Mutex<Vec<RequestLog>>>,
}

impl DebugStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: RequestLog) {
        self.lock().push(entry);
    }

    /// Snapshot of every entry, oldest first.
    pub fn list(&self) -> Vec<RequestLog> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RequestLog>> {
        self.logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Logger plugin options.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerOptions {
    /// Record entries. Defaults to on everywhere but production.
    pub enabled: Option<bool>,
}

/// Build the logger plugin writing into `store`.
pub fn logger_plugin(store: DebugStore, options: LoggerOptions) -> Plugin {
    let enabled = options
        .enabled
        .unwrap_or_else(|| !Environment::current().is_production());
    let on_response_store = store.clone();
    let on_error_store = store;

    Plugin::new("logger")
        .on_request(move |req| {
            if !enabled {
                return None;
            }
            let mut req = req.clone();
            req.extensions_mut().insert(StartedAt(Instant::now()));
            Some(req)
        })
        .on_response(move |res| {
            if enabled {
                let mut entry = entry_for(res.request(), true);
                entry.status = Some(res.status().as_u16());
                entry.response = Some(res.body().clone());
                record(&on_response_store, entry);
            }
            None
        })
        .on_error(move |err| {
            if enabled {
                let request = err
                    .request()
                    .cloned()
                    .unwrap_or_else(|| RequestDescriptor::new(http::Method::GET, ""));
                let mut entry = entry_for(&request, false);
                entry.status = err.status().map(|s| s.as_u16());
                entry.error = Some(err.to_string());
                record(&on_error_store, entry);
            }
            None
        })
}

fn entry_for(request: &RequestDescriptor, ok: bool) -> RequestLog {
    let now = Instant::now();
    let started = request
        .extensions()
        .get::<StartedAt>()
        .map_or(now, |s| s.0);
    let duration_ms = u64::try_from(now.duration_since(started).as_millis()).unwrap_or(u64::MAX);

    RequestLog {
        method: request.method().as_str().to_ascii_uppercase(),
        url: request.url().to_string(),
        params: request.params().map(|p| p.to_json()),
        body: request.body().map(|b| match b {
            Body::Json(payload) => payload.to_json(),
            Body::Form(s) | Body::Text(s) => Value::String(s.clone()),
        }),
        status: None,
        ok,
        duration_ms,
        timestamp: OffsetDateTime::now_utc(),
        response: None,
        error: None,
    }
}

fn record(store: &DebugStore, entry: RequestLog) {
    tracing::debug!(
        method = %entry.method,
        url = %entry.url,
        status = ?entry.status,
        ok = entry.ok,
        duration_ms = entry.duration_ms,
        "request completed"
    );
    store.push(entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::error::{ErrorKind, RequestError};
    use crate::base::payload::Payload;
    use crate::http::response::Response;
    use crate::plugins::PluginChain;
    use http::{HeaderMap, Method, StatusCode};
    use serde_json::json;
    use std::time::Duration;

    fn chain(store: &DebugStore, enabled: bool) -> PluginChain {
        let chain = PluginChain::new();
        chain.push(logger_plugin(
            store.clone(),
            LoggerOptions {
                enabled: Some(enabled),
            },
        ));
        chain
    }

    #[tokio::test(start_paused = true)]
    async fn test_logs_success_with_duration() {
        let store = DebugStore::new();
        let chain = chain(&store, true);

        let req = chain.run_request(
            RequestDescriptor::new(Method::GET, "/users")
                .with_params(Payload::object([("page", 1i64)])),
        );
        assert!(req.extensions().get::<StartedAt>().is_some());

        tokio::time::advance(Duration::from_millis(120)).await;
        chain.run_response(Response::new(StatusCode::OK, HeaderMap::new(), json!([1, 2]), req));

        let logs = store.list();
        assert_eq!(logs.len(), 1);
        let log = &logs[0];
        assert_eq!(log.method, "GET");
        assert_eq!(log.url, "/users");
        assert_eq!(log.params, Some(json!({"page": 1})));
        assert_eq!(log.status, Some(200));
        assert!(log.ok);
        assert_eq!(log.duration_ms, 120);
        assert_eq!(log.response, Some(json!([1, 2])));
        assert!(log.error.is_none());
    }

    #[tokio::test]
    async fn test_logs_failure() {
        let store = DebugStore::new();
        let chain = chain(&store, true);

        let req = chain.run_request(
            RequestDescriptor::new(Method::POST, "/users").with_body(Payload::object([("a", 1i64)])),
        );
        chain.run_error(
            RequestError::new(ErrorKind::Status {
                status: StatusCode::BAD_GATEWAY,
                body: json!(null),
            })
            .with_request(req),
        );

        let logs = store.list();
        let log = &logs[0];
        assert_eq!(log.method, "POST");
        assert_eq!(log.body, Some(json!({"a": 1})));
        assert_eq!(log.status, Some(502));
        assert!(!log.ok);
        assert_eq!(log.error.as_deref(), Some("HTTP 502 Bad Gateway"));
    }

    #[tokio::test]
    async fn test_disabled_records_nothing() {
        let store = DebugStore::new();
        let chain = chain(&store, false);
        let req = chain.run_request(RequestDescriptor::new(Method::GET, "/a"));
        assert!(req.extensions().get::<StartedAt>().is_none());
        chain.run_response(Response::new(StatusCode::OK, HeaderMap::new(), json!(null), req));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_clear() {
        let store = DebugStore::new();
        store.push(entry_for(&RequestDescriptor::new(Method::GET, "/a"), true));
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_log_serializes_timestamp_as_rfc3339() {
        let log = entry_for(&RequestDescriptor::new(Method::GET, "/a"), true);
        let json = serde_json::to_value(&log).unwrap();
        let ts = json["timestamp"].as_str().unwrap();
        assert!(OffsetDateTime::parse(ts, &time::format_description::well_known::Rfc3339).is_ok());
    }
}
