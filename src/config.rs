//! Client configuration and deployment environment.

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Environment variable naming the deployment environment.
pub const ENV_VAR: &str = "APP_ENV";

/// Default transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15000);

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Read [`ENV_VAR`]; unset or unknown values mean development.
    pub fn current() -> Self {
        std::env::var(ENV_VAR)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    /// Parse an environment name.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Base URLs per environment.
#[derive(Debug, Clone)]
pub struct EnvBaseUrls {
    pub dev: String,
    /// Falls back to `prod` when unset.
    pub staging: Option<String>,
    pub prod: String,
}

impl EnvBaseUrls {
    pub fn select(&self, env: Environment) -> &str {
        match env {
            Environment::Production => &self.prod,
            Environment::Staging => self.staging.as_deref().unwrap_or(&self.prod),
            Environment::Development => &self.dev,
        }
    }
}

/// Decides which statuses count as success.
pub type StatusValidator = fn(StatusCode) -> bool;

fn is_success(status: StatusCode) -> bool {
    status.is_success()
}

/// Client-wide defaults.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base for relative request URLs.
    pub base_url: Option<Url>,

    /// Transport timeout applied when a request sets none (default: 15s).
    pub timeout: Duration,

    /// Headers sent with every request unless the request overrides them.
    pub headers: HeaderMap,

    /// Status check; failing statuses become errors (default: 2xx).
    pub validate_status: StatusValidator,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            headers,
            validate_status: is_success,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
