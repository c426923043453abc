//! Per-call options of the semantic API.

use crate::base::error::RequestError;
use crate::base::payload::Payload;
use crate::http::requestcache::DEFAULT_TTL;
use crate::http::retry::RetryPolicy;
use crate::plugins::loading::LoadingCallback;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maps the response body to the caller's type, or rejects it.
pub type Contract<T> = Arc<dyn Fn(Value) -> Result<T, RequestError> + Send + Sync>;

/// Transforms an outgoing payload after normalization.
pub type Encrypt = Arc<dyn Fn(Payload) -> Payload + Send + Sync>;

/// Transforms a response body before the contract sees it.
pub type Decrypt = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Transport-level settings for one call.
#[derive(Debug, Clone, Default)]
pub struct CallConfig {
    /// Extra headers; they override the client defaults.
    pub headers: HeaderMap,
    pub timeout: Option<Duration>,
}

/// Response caching for one call.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub enabled: bool,
    /// Time to live (default: 5s)
    pub ttl: Duration,
    /// Cache key; defaults to the request key.
    pub key: Option<String>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: DEFAULT_TTL,
            key: None,
        }
    }
}

impl CacheOptions {
    /// Caching enabled with the given TTL.
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            enabled: true,
            ttl,
            key: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Request control for one call.
#[derive(Debug, Clone, Default)]
pub struct ApiExtras {
    /// Request key; defaults to the request fingerprint.
    pub key: Option<String>,
    /// Cancel an in-flight request with the same key (default: true)
    pub auto_cancel: Option<bool>,
    pub retry: Option<RetryPolicy>,
    pub silent: Option<bool>,
    pub cache: CacheOptions,
}

/// Loading-state callback for one call.
#[derive(Clone)]
pub struct LoadingOptions {
    pub enabled: bool,
    pub on_change: LoadingCallback,
}

impl LoadingOptions {
    pub fn new<F>(on_change: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        Self {
            enabled: true,
            on_change: Arc::new(on_change),
        }
    }
}

impl fmt::Debug for LoadingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingOptions")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Payload pipeline for one call.
#[derive(Clone, Default)]
pub struct TransformOptions {
    /// Drop `""` and null object fields.
    pub filter_empty: bool,
    /// Render dates as RFC 3339 text.
    pub date_to_iso: bool,
    pub encrypt: Option<Encrypt>,
    pub decrypt: Option<Decrypt>,
}

impl TransformOptions {
    #[must_use]
    pub fn filter_empty(mut self) -> Self {
        self.filter_empty = true;
        self
    }

    #[must_use]
    pub fn date_to_iso(mut self) -> Self {
        self.date_to_iso = true;
        self
    }

    #[must_use]
    pub fn encrypt<F>(mut self, encrypt: F) -> Self
    where
        F: Fn(Payload) -> Payload + Send + Sync + 'static,
    {
        self.encrypt = Some(Arc::new(encrypt));
        self
    }

    #[must_use]
    pub fn decrypt<F>(mut self, decrypt: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.decrypt = Some(Arc::new(decrypt));
        self
    }
}

impl fmt::Debug for TransformOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformOptions")
            .field("filter_empty", &self.filter_empty)
            .field("date_to_iso", &self.date_to_iso)
            .field("encrypt", &self.encrypt.is_some())
            .field("decrypt", &self.decrypt.is_some())
            .finish()
    }
}

/// Options of one semantic API call returning `T`.
pub struct RequestOptions<T> {
    /// Query parameters
    pub params: Option<Payload>,
    /// Request body
    pub data: Option<Payload>,
    pub config: CallConfig,
    pub extras: ApiExtras,
    /// Maps the body to `T`; serde deserialization is used when unset.
    pub contract: Option<Contract<T>>,
    pub loading: Option<LoadingOptions>,
    pub transform: Option<TransformOptions>,
}

impl<T> Default for RequestOptions<T> {
    fn default() -> Self {
        Self {
            params: None,
            data: None,
            config: CallConfig::default(),
            extras: ApiExtras::default(),
            contract: None,
            loading: None,
            transform: None,
        }
    }
}

impl<T> Clone for RequestOptions<T> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            data: self.data.clone(),
            config: self.config.clone(),
            extras: self.extras.clone(),
            contract: self.contract.clone(),
            loading: self.loading.clone(),
            transform: self.transform.clone(),
        }
    }
}

impl<T> fmt::Debug for RequestOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("params", &self.params)
            .field("data", &self.data)
            .field("config", &self.config)
            .field("extras", &self.extras)
            .field("contract", &self.contract.is_some())
            .field("loading", &self.loading)
            .field("transform", &self.transform)
            .finish()
    }
}

impl<T> RequestOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn params(mut self, params: impl Into<Payload>) -> Self {
        self.params = Some(params.into());
        self
    }

    #[must_use]
    pub fn data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Add a header. Invalid names or values are ignored.
    #[must_use]
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

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.extras.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn auto_cancel(mut self, auto_cancel: bool) -> Self {
        self.extras.auto_cancel = Some(auto_cancel);
        self
    }

    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.extras.retry = Some(policy);
        self
    }

    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.extras.silent = Some(silent);
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: CacheOptions) -> Self {
        self.extras.cache = cache;
        self
    }

    #[must_use]
    pub fn contract<F>(mut self, contract: F) -> Self
    where
        F: Fn(Value) -> Result<T, RequestError> + Send + Sync + 'static,
    {
        self.contract = Some(Arc::new(contract));
        self
    }

    #[must_use]
    pub fn loading<F>(mut self, on_change: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.loading = Some(LoadingOptions::new(on_change));
        self
    }

    #[must_use]
    pub fn transform(mut self, transform: TransformOptions) -> Self {
        self.transform = Some(transform);
        self
    }
}
