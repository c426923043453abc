//! Request client with builder pattern.
//!
//! The [`Client`] owns a [`Transport`], the in-flight registry and the plugin
//! chain, and exposes one primitive, [`Client::request`], which dispatches a
//! descriptor with cancellation and retry.
//!
//! # Example
//!
//! ```rust,ignore
//! use requestkit::{Client, RequestExtras, RetryPolicy};
//! use requestkit::http::RequestDescriptor;
//!
//! let client = Client::builder()
//!     .base_url("http://localhost:3000".parse()?)
//!     .build();
//!
//! let res = client
//!     .request(
//!         RequestDescriptor::new(http::Method::GET, "/users"),
//!         RequestExtras::default().retry(RetryPolicy::times(2)),
//!     )
//!     .await?;
//! ```

use crate::base::error::{ErrorKind, RequestError};
use crate::base::payload::Payload;
use crate::config::{ClientConfig, EnvBaseUrls, Environment, StatusValidator};
use crate::http::hypertransport::HyperTransport;
use crate::http::inflight::{InFlightRegistry, Registration};
use crate::http::request::{Body, RequestDescriptor, FORM_URLENCODED};
use crate::http::response::{decode_body, Response};
use crate::http::retry::RetryPolicy;
use crate::http::transport::{Transport, TransportRequest};
use crate::plugins::{Plugin, PluginChain};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Per-call options of [`Client::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestExtras {
    /// Registry key; defaults to the request fingerprint.
    pub key: Option<String>,
    /// Cancel an in-flight request with the same key before dispatching.
    pub auto_cancel: bool,
    /// Retry policy; no retries when unset.
    pub retry: Option<RetryPolicy>,
    /// Suppress user-facing notifications for this call.
    pub silent: Option<bool>,
}

impl RequestExtras {
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn auto_cancel(mut self, auto_cancel: bool) -> Self {
        self.auto_cancel = auto_cancel;
        self
    }

    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    registry: InFlightRegistry,
    plugins: PluginChain,
    config: ClientConfig,
}

/// HTTP request client.
///
/// Cloning is cheap; clones share the registry and the plugin chain. Separate
/// [`Client::new`] / [`ClientBuilder::build`] calls never share state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("plugins", &self.inner.plugins.names())
            .field("in_flight", &self.inner.registry.len())
            .finish()
    }
}

impl Client {
    /// Create a client with default settings over [`HyperTransport`].
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Build a client whose base URL is chosen by the current [`Environment`].
    pub fn for_env(bases: &EnvBaseUrls, builder: ClientBuilder) -> Result<Self, RequestError> {
        Self::for_environment(Environment::current(), bases, builder)
    }

    /// Build a client whose base URL is chosen by `env`.
    pub fn for_environment(
        env: Environment,
        bases: &EnvBaseUrls,
        builder: ClientBuilder,
    ) -> Result<Self, RequestError> {
        let base = Url::parse(bases.select(env))?;
        tracing::debug!(environment = ?env, base_url = %base, "selected base url");
        Ok(builder.base_url(base).build())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Register a plugin. Plugins run in registration order.
    pub fn use_plugin(&self, plugin: Plugin) {
        self.inner.plugins.push(plugin);
    }

    /// Register a bare request hook.
    pub fn use_request<F>(&self, hook: F)
    where
        F: Fn(&RequestDescriptor) -> Option<RequestDescriptor> + Send + Sync + 'static,
    {
        self.use_plugin(Plugin::new("request-hook").on_request(hook));
    }

    /// Register a bare response hook.
    pub fn use_response<F>(&self, hook: F)
    where
        F: Fn(&Response) -> Option<Response> + Send + Sync + 'static,
    {
        self.use_plugin(Plugin::new("response-hook").on_response(hook));
    }

    /// Register a bare error hook.
    pub fn use_error<F>(&self, hook: F)
    where
        F: Fn(&RequestError) -> Option<RequestError> + Send + Sync + 'static,
    {
        self.use_plugin(Plugin::new("error-hook").on_error(hook));
    }

    /// Names of registered plugins, in invocation order.
    pub fn plugins(&self) -> Vec<String> {
        self.inner.plugins.names()
    }

    /// Cancel the in-flight request registered under `key`.
    ///
    /// Returns false when nothing was in flight under that key.
    pub fn cancel(&self, key: &str) -> bool {
        self.inner.registry.cancel(key)
    }

    /// Cancel every in-flight request. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.inner.registry.cancel_all();
        tracing::debug!(cancelled, "cancelled all in-flight requests");
        cancelled
    }

    /// Keys of requests currently in flight.
    pub fn in_flight(&self) -> Vec<String> {
        self.inner.registry.keys()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inner.registry.contains(key)
    }

    pub async fn get(&self, url: impl Into<String>) -> Result<Response, RequestError> {
        self.send_simple(RequestDescriptor::new(Method::GET, url)).await
    }

    pub async fn post(&self, url: impl Into<String>, body: impl Into<Body>) -> Result<Response, RequestError> {
        self.send_simple(RequestDescriptor::new(Method::POST, url).with_body(body)).await
    }

    pub async fn put(&self, url: impl Into<String>, body: impl Into<Body>) -> Result<Response, RequestError> {
        self.send_simple(RequestDescriptor::new(Method::PUT, url).with_body(body)).await
    }

    pub async fn patch(&self, url: impl Into<String>, body: impl Into<Body>) -> Result<Response, RequestError> {
        self.send_simple(RequestDescriptor::new(Method::PATCH, url).with_body(body)).await
    }

    pub async fn delete(&self, url: impl Into<String>) -> Result<Response, RequestError> {
        self.send_simple(RequestDescriptor::new(Method::DELETE, url)).await
    }

    pub async fn head(&self, url: impl Into<String>) -> Result<Response, RequestError> {
        self.send_simple(RequestDescriptor::new(Method::HEAD, url)).await
    }

    pub async fn options(&self, url: impl Into<String>) -> Result<Response, RequestError> {
        self.send_simple(RequestDescriptor::new(Method::OPTIONS, url)).await
    }

    async fn send_simple(&self, descriptor: RequestDescriptor) -> Result<Response, RequestError> {
        self.request(descriptor, RequestExtras::default()).await
    }

    /// Dispatch `descriptor` with cancellation and retry.
    ///
    /// The request key (`extras.key` or the fingerprint) and the silent flag
    /// are attached to the descriptor before the first dispatch. Without an
    /// external signal the client registers its own token under the key; the
    /// entry is released when the call ends, however it ends.
    pub async fn request(
        &self,
        mut descriptor: RequestDescriptor,
        extras: RequestExtras,
    ) -> Result<Response, RequestError> {
        let key = extras.key.unwrap_or_else(|| descriptor.fingerprint());
        descriptor.set_key(key.clone());
        if extras.silent.is_some() {
            descriptor.set_silent(extras.silent);
        }

        let registry = &self.inner.registry;
        let mut guard = RegistrationGuard {
            registry,
            registration: None,
        };
        let signal = match descriptor.signal() {
            Some(external) => {
                if extras.auto_cancel {
                    registry.cancel(&key);
                }
                external.clone()
            }
            None => {
                let registration = registry.register(&key, extras.auto_cancel);
                let token = registration.token().clone();
                guard.registration = Some(registration);
                descriptor.set_signal(Some(token.clone()));
                token
            }
        };

        let policy = extras.retry.unwrap_or_default();
        let result = self.run(&descriptor, &policy, &signal).await;
        drop(guard);
        result
    }

    async fn run(
        &self,
        descriptor: &RequestDescriptor,
        policy: &RetryPolicy,
        signal: &CancellationToken,
    ) -> Result<Response, RequestError> {
        let key = descriptor.key().unwrap_or_default();
        let mut attempt: u32 = 0;
        loop {
            let err = match self.dispatch(descriptor.clone(), signal).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            attempt += 1;
            if !policy.should_retry(attempt, &err) {
                if attempt > policy.times && policy.times > 0 && !err.is_cancelled() {
                    tracing::warn!(key = %key, attempts = attempt, error = %err, "retry budget exhausted");
                }
                return Err(err);
            }

            let delay = policy.strategy.next_delay(attempt);
            tracing::debug!(
                key = %key,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "retrying request"
            );
            tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    tracing::debug!(key = %key, "cancelled during backoff");
                    return Err(RequestError::new(ErrorKind::Cancelled).with_request(descriptor.clone()));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One attempt: request hooks, transport, status check, then response or
    /// error hooks.
    async fn dispatch(
        &self,
        descriptor: RequestDescriptor,
        signal: &CancellationToken,
    ) -> Result<Response, RequestError> {
        let plugins = &self.inner.plugins;
        let request = plugins.run_request(descriptor);
        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            key = request.key().unwrap_or_default(),
            "dispatching request"
        );

        match self.send(&request, signal).await {
            Ok(response) => Ok(plugins.run_response(response)),
            Err(kind) => Err(plugins.run_error(RequestError::new(kind).with_request(request))),
        }
    }

    async fn send(
        &self,
        request: &RequestDescriptor,
        signal: &CancellationToken,
    ) -> Result<Response, ErrorKind> {
        let outgoing = self.resolve(request, signal)?;
        let sending = self.inner.transport.send(outgoing);
        let raw = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(ErrorKind::Cancelled),
            result = sending => result?,
        };

        if !(self.inner.config.validate_status)(raw.status) {
            return Err(ErrorKind::Status {
                status: raw.status,
                body: decode_body(&raw.body),
            });
        }
        Ok(Response::from_transport(raw, request.clone()))
    }

    /// Turn a descriptor into a wire request: absolute URL with query,
    /// merged headers, encoded body and effective timeout.
    fn resolve(
        &self,
        request: &RequestDescriptor,
        signal: &CancellationToken,
    ) -> Result<TransportRequest, ErrorKind> {
        let config = &self.inner.config;

        let mut url = resolve_url(config.base_url.as_ref(), request.url())?;
        if let Some(params) = request.params() {
            append_query(&mut url, params)?;
        }

        let mut headers = config.headers.clone();
        headers.extend(request.headers().clone());
        let body = encode_body(request.body(), &mut headers)?;

        Ok(TransportRequest {
            method: request.method().clone(),
            url,
            headers,
            body,
            timeout: Some(request.timeout().unwrap_or(config.timeout)),
            signal: signal.clone(),
        })
    }
}

/// Releases the registry entry when the call ends or its future is dropped.
struct RegistrationGuard<'a> {
    registry: &'a InFlightRegistry,
    registration: Option<Registration>,
}

impl Drop for RegistrationGuard<'_> {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            self.registry.release(&registration);
        }
    }
}

/// Absolute URLs are used as-is; relative ones are appended to the base.
fn resolve_url(base: Option<&Url>, url: &str) -> Result<Url, ErrorKind> {
    match Url::parse(url) {
        Ok(absolute) => Ok(absolute),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| {
                ErrorKind::InvalidRequest(format!("relative URL without base URL: {url}"))
            })?;
            let joined = format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                url.trim_start_matches('/')
            );
            Url::parse(&joined).map_err(|e| ErrorKind::InvalidRequest(e.to_string()))
        }
        Err(e) => Err(ErrorKind::InvalidRequest(e.to_string())),
    }
}

/// Append object params as query pairs. Nulls are skipped, arrays repeat the
/// key, nested objects are sent as JSON text.
fn append_query(url: &mut Url, params: &Payload) -> Result<(), ErrorKind> {
    let entries = match params {
        Payload::Null => return Ok(()),
        Payload::Object(entries) => entries,
        _ => {
            return Err(ErrorKind::InvalidRequest(
                "query parameters must be an object".to_string(),
            ))
        }
    };

    let mut pairs = Vec::new();
    for (name, value) in entries {
        match value {
            Payload::Null => {}
            Payload::Array(items) => {
                pairs.extend(
                    items
                        .iter()
                        .filter(|item| !item.is_null())
                        .map(|item| (name.as_str(), item.to_string())),
                );
            }
            other => pairs.push((name.as_str(), other.to_string())),
        }
    }

    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(())
}

/// Encode the body, filling in a content type the request does not declare.
fn encode_body(body: Option<&Body>, headers: &mut HeaderMap) -> Result<Bytes, ErrorKind> {
    let Some(body) = body else {
        return Ok(Bytes::new());
    };
    match body {
        Body::Json(payload) => {
            let bytes = serde_json::to_vec(payload).map_err(|e| ErrorKind::Encode(e.to_string()))?;
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/json"));
            Ok(Bytes::from(bytes))
        }
        Body::Form(encoded) => {
            let declared_form = headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.to_ascii_lowercase().contains(FORM_URLENCODED));
            if !declared_form {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
            }
            Ok(Bytes::from(encoded.clone()))
        }
        Body::Text(text) => Ok(Bytes::from(text.clone())),
    }
}

/// Builder for creating a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    plugins: Vec<Plugin>,
}

impl ClientBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the base for relative request URLs.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.config.base_url = Some(base_url);
        self
    }

    /// Set the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Add a default header. Invalid names or values are ignored.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        if let (Ok(k), Ok(v)) = (key.try_into(), value.try_into()) {
            self.config.headers.insert(k, v);
        }
        self
    }

    /// Set the status check deciding which responses are successes.
    pub fn validate_status(mut self, validate: StatusValidator) -> Self {
        self.config.validate_status = validate;
        self
    }

    /// Use a custom transport instead of [`HyperTransport`].
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Register a plugin at construction.
    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HyperTransport::new()));
        let plugins = PluginChain::new();
        for plugin in self.plugins {
            plugins.push(plugin);
        }

        Client {
            inner: Arc::new(ClientInner {
                transport,
                registry: InFlightRegistry::new(),
                plugins,
                config: self.config,
            }),
        }
    }
}
