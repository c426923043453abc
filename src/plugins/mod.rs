//! Plugin hooks.
//!
//! A [`Plugin`] is a set of optional hooks over the request, the response and
//! the error of every dispatch. Hooks run in registration order. Each hook
//! receives the current value and returns `Some(replacement)` or `None` to keep
//! it. Error hooks transform errors but cannot turn them into successes.
//!
//! Hooks are not isolated from one another: a panicking hook unwinds through
//! the rest of the chain.
//!
//! - [`loading`]: balanced `(key, true)` / `(key, false)` callbacks
//! - [`logger`]: request log with durations
//! - [`errortips`]: user-facing failure notifications

pub mod errortips;
pub mod loading;
pub mod logger;

use crate::base::error::RequestError;
use crate::http::request::RequestDescriptor;
use crate::http::response::Response;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, RwLock};

pub type RequestHook = Arc<dyn Fn(&RequestDescriptor) -> Option<RequestDescriptor> + Send + Sync>;
pub type ResponseHook = Arc<dyn Fn(&Response) -> Option<Response> + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&RequestError) -> Option<RequestError> + Send + Sync>;

/// A named set of optional hooks.
#[derive(Clone, Default)]
pub struct Plugin {
    name: Cow<'static, str>,
    on_request: Option<RequestHook>,
    on_response: Option<ResponseHook>,
    on_error: Option<ErrorHook>,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("on_request", &self.on_request.is_some())
            .field("on_response", &self.on_response.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl Plugin {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestDescriptor) -> Option<RequestDescriptor> + Send + Sync + 'static,
    {
        self.on_request = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Response) -> Option<Response> + Send + Sync + 'static,
    {
        self.on_response = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestError) -> Option<RequestError> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered plugin list owned by a client.
///
/// Each run works on a snapshot, so plugins registered mid-flight only affect
/// later dispatches.
#[derive(Default)]
pub struct PluginChain {
    plugins: RwLock<Vec<Arc<Plugin>>>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin; it runs after every plugin registered before it.
    pub fn push(&self, plugin: Plugin) {
        tracing::debug!(plugin = %plugin.name(), "registered plugin");
        self.write().push(Arc::new(plugin));
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.read().iter().map(|p| p.name().to_string()).collect()
    }

    pub fn run_request(&self, mut request: RequestDescriptor) -> RequestDescriptor {
        for plugin in self.snapshot() {
            if let Some(hook) = &plugin.on_request {
                if let Some(replaced) = hook(&request) {
                    request = replaced;
                }
            }
        }
        request
    }

    pub fn run_response(&self, mut response: Response) -> Response {
        for plugin in self.snapshot() {
            if let Some(hook) = &plugin.on_response {
                if let Some(replaced) = hook(&response) {
                    response = replaced;
                }
            }
        }
        response
    }

    pub fn run_error(&self, mut error: RequestError) -> RequestError {
        for plugin in self.snapshot() {
            if let Some(hook) = &plugin.on_error {
                if let Some(replaced) = hook(&error) {
                    error = replaced;
                }
            }
        }
        error
    }

    fn snapshot(&self) -> Vec<Arc<Plugin>> {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Plugin>>> {
        self.plugins.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<Plugin>>> {
        self.plugins.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
