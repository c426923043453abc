//! Semantic request API.
//!
//! [`Api`] wraps a [`Client`] with verb methods that return typed data rather
//! than responses. A call goes through these steps:
//!
//! 1. Derive the request key (explicit key, else the fingerprint of the call
//!    as given, form-encoded if the content type asks for it).
//! 2. Serve a fresh cache hit without touching the network or the plugins.
//! 3. Signal loading, normalize and encrypt the payload, form-encode it if
//!    needed, and dispatch through the client (auto-cancel on by default).
//! 4. Decrypt, apply the contract (or deserialize), cache the result.
//!
//! Loading is signalled off again on every exit path, including the call's
//! future being dropped.

pub mod options;
pub mod transform;

pub use options::{
    ApiExtras, CacheOptions, CallConfig, Contract, LoadingOptions, RequestOptions,
    TransformOptions,
};
pub use transform::{encode_form_body, normalize_payload, serialize_form};

use crate::base::error::RequestError;
use crate::client::{Client, RequestExtras};
use crate::http::request::{Body, RequestDescriptor};
use crate::http::requestcache::RequestCache;
use crate::plugins::loading::LoadingCallback;
use http::Method;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::sync::Arc;

/// Type-erased cache value.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Semantic API over a [`Client`].
///
/// Owns one response cache. Clones share it.
#[derive(Clone)]
pub struct Api {
    client: Client,
    cache: Arc<RequestCache<CachedValue>>,
}

impl Api {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Arc::new(RequestCache::new()),
        }
    }

    /// The underlying client.
    pub fn raw(&self) -> &Client {
        &self.client
    }

    /// The response cache, for invalidation.
    pub fn cache(&self) -> &RequestCache<CachedValue> {
        &self.cache
    }

    pub async fn get<T>(&self, url: &str, options: RequestOptions<T>) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.verb(Method::GET, url, options).await
    }

    pub async fn post<T>(&self, url: &str, options: RequestOptions<T>) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.verb(Method::POST, url, options).await
    }

    pub async fn put<T>(&self, url: &str, options: RequestOptions<T>) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.verb(Method::PUT, url, options).await
    }

    pub async fn patch<T>(&self, url: &str, options: RequestOptions<T>) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.verb(Method::PATCH, url, options).await
    }

    pub async fn delete<T>(&self, url: &str, options: RequestOptions<T>) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.verb(Method::DELETE, url, options).await
    }

    pub async fn head<T>(&self, url: &str, options: RequestOptions<T>) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.verb(Method::HEAD, url, options).await
    }

    pub async fn options<T>(&self, url: &str, options: RequestOptions<T>) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.verb(Method::OPTIONS, url, options).await
    }

    /// Run a prepared descriptor.
    ///
    /// The descriptor is used as given: `params`, `data` and `config` of the
    /// options are ignored.
    pub async fn request<T>(
        &self,
        descriptor: RequestDescriptor,
        options: RequestOptions<T>,
    ) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.execute(descriptor, options).await
    }

    async fn verb<T>(&self, method: Method, url: &str, mut options: RequestOptions<T>) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let mut descriptor = RequestDescriptor::new(method, url);
        if let Some(params) = options.params.take() {
            descriptor = descriptor.with_params(params);
        }
        if let Some(data) = options.data.take() {
            descriptor = descriptor.with_body(data);
        }
        descriptor
            .headers_mut()
            .extend(std::mem::take(&mut options.config.headers));
        if let Some(timeout) = options.config.timeout {
            descriptor = descriptor.with_timeout(timeout);
        }
        self.execute(descriptor, options).await
    }

    async fn execute<T>(
        &self,
        mut descriptor: RequestDescriptor,
        options: RequestOptions<T>,
    ) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let RequestOptions {
            extras,
            contract,
            loading,
            transform,
            ..
        } = options;

        let key = match extras.key {
            Some(key) => key,
            None => {
                let mut keyed = descriptor.clone();
                encode_form_body(&mut keyed)?;
                keyed.fingerprint()
            }
        };

        let cache_key = extras
            .cache
            .enabled
            .then(|| extras.cache.key.clone().unwrap_or_else(|| key.clone()));
        if let Some(cache_key) = &cache_key {
            if let Some(hit) = self.lookup::<T>(cache_key) {
                return Ok(hit);
            }
        }

        let _loading = loading
            .filter(|l| l.enabled)
            .map(|l| LoadingGuard::start(l.on_change, &key));

        if let Some(transform) = &transform {
            if let Some(Body::Json(payload)) = descriptor.body() {
                let mut payload =
                    normalize_payload(payload.clone(), transform.filter_empty, transform.date_to_iso);
                if let Some(encrypt) = &transform.encrypt {
                    payload = encrypt(payload);
                }
                descriptor.set_body(Some(Body::Json(payload)));
            }
        }
        encode_form_body(&mut descriptor)?;

        let client_extras = RequestExtras {
            key: Some(key),
            auto_cancel: extras.auto_cancel.unwrap_or(true),
            retry: extras.retry,
            silent: extras.silent,
        };
        let response = self.client.request(descriptor, client_extras).await?;

        let mut body = response.into_body();
        if let Some(decrypt) = transform.as_ref().and_then(|t| t.decrypt.as_ref()) {
            body = decrypt(body);
        }
        let data: T = match &contract {
            Some(contract) => contract(body)?,
            None => serde_json::from_value(body)?,
        };

        if let Some(cache_key) = cache_key {
            self.cache
                .set(cache_key, Arc::new(data.clone()) as CachedValue, extras.cache.ttl);
        }
        Ok(data)
    }

    /// A fresh entry of another type counts as a miss.
    fn lookup<T>(&self, cache_key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let hit = self.cache.get(cache_key)?;
        match hit.downcast_ref::<T>() {
            Some(value) => {
                tracing::debug!(key = %cache_key, "cache hit");
                Some(value.clone())
            }
            None => {
                tracing::debug!(key = %cache_key, "cached value has a different type");
                None
            }
        }
    }
}

/// Signals `(key, true)` on start and `(key, false)` when dropped.
struct LoadingGuard {
    on_change: LoadingCallback,
    key: String,
}

impl LoadingGuard {
    fn start(on_change: LoadingCallback, key: &str) -> Self {
        on_change(key, true);
        Self {
            on_change,
            key: key.to_string(),
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        (self.on_change)(&self.key, false);
    }
}
