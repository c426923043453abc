//! User-facing failure notifications.
//!
//! Classifies failures and hands a message to a caller-supplied notifier
//! (a toast, a status bar...). Business failures are responses that arrived
//! fine but whose payload carries a numeric code different from the success
//! code; those are notified but still returned as responses.
//!
//! Silent requests and cancellations are never notified. The error itself is
//! always propagated.

use crate::base::error::RequestError;
use crate::http::request::RequestDescriptor;
use crate::plugins::Plugin;
use http::StatusCode;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub const NETWORK_MESSAGE: &str = "Network error, please try again later";
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized or session expired";
pub const SERVER_MESSAGE: &str = "Server error, please contact the administrator";
pub const BUSINESS_MESSAGE: &str = "Business error";
pub const CLIENT_MESSAGE: &str = "Request failed";

/// Failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TipCategory {
    /// No response received.
    Network,
    /// 401.
    Unauthorized,
    /// 5xx.
    Server,
    /// 2xx with a failing business code.
    Business,
    /// Any other failure (typically 4xx).
    Client,
}

/// A notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tip {
    pub category: TipCategory,
    pub message: String,
}

pub type Notifier = Arc<dyn Fn(&Tip) + Send + Sync>;

/// Error-tips configuration.
#[derive(Clone)]
pub struct ErrorTipsOptions {
    pub notify: Option<Notifier>,
    /// Payload field holding the business code (default: `code`)
    pub code_field: String,
    /// Payload field holding the business message (default: `message`)
    pub message_field: String,
    /// Business code meaning success (default: 0)
    pub success_code: i64,
    /// Silence applied to requests that do not say (default: false)
    pub default_silent: bool,
}

impl Default for ErrorTipsOptions {
    fn default() -> Self {
        Self {
            notify: None,
            code_field: "code".to_string(),
            message_field: "message".to_string(),
            success_code: 0,
            default_silent: false,
        }
    }
}

impl fmt::Debug for ErrorTipsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorTipsOptions")
            .field("notify", &self.notify.is_some())
            .field("code_field", &self.code_field)
            .field("message_field", &self.message_field)
            .field("success_code", &self.success_code)
            .field("default_silent", &self.default_silent)
            .finish()
    }
}

impl ErrorTipsOptions {
    /// Options with a notifier and defaults for everything else.
    pub fn with_notifier<F>(notify: F) -> Self
    where
        F: Fn(&Tip) + Send + Sync + 'static,
    {
        Self {
            notify: Some(Arc::new(notify)),
            ..Default::default()
        }
    }
}

/// Classify a failed request. Any failure without a response is a network
/// failure.
pub fn classify_error(err: &RequestError) -> Tip {
    let (category, message) = match err.status() {
        None => (TipCategory::Network, NETWORK_MESSAGE.to_string()),
        Some(StatusCode::UNAUTHORIZED) => {
            (TipCategory::Unauthorized, UNAUTHORIZED_MESSAGE.to_string())
        }
        Some(status) if status.is_server_error() => {
            (TipCategory::Server, SERVER_MESSAGE.to_string())
        }
        _ => {
            let message = err
                .response_body()
                .and_then(|body| body.get("message"))
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .or_else(|| Some(err.to_string()).filter(|s| !s.is_empty()))
                .unwrap_or_else(|| CLIENT_MESSAGE.to_string());
            (TipCategory::Client, message)
        }
    };
    Tip { category, message }
}

/// Classify a successful response body; `None` when the business code is
/// absent, non-numeric or equal to the success code.
pub fn classify_business(body: &Value, options: &ErrorTipsOptions) -> Option<Tip> {
    let code = body.get(&options.code_field)?.as_i64()?;
    if code == options.success_code {
        return None;
    }
    let message = body
        .get(&options.message_field)
        .and_then(Value::as_str)
        .unwrap_or(BUSINESS_MESSAGE)
        .to_string();
    Some(Tip {
        category: TipCategory::Business,
        message,
    })
}

/// Build the error-tips plugin.
pub fn error_tips_plugin(options: ErrorTipsOptions) -> Plugin {
    let options = Arc::new(options);
    let on_response = options.clone();
    let on_error = options;

    Plugin::new("error-tips")
        .on_response(move |res| {
            if let Some(tip) = classify_business(res.body(), &on_response) {
                notify(&on_response, Some(res.request()), &tip);
            }
            None
        })
        .on_error(move |err| {
            if err.is_cancelled() {
                return None;
            }
            let tip = classify_error(err);
            notify(&on_error, err.request(), &tip);
            None
        })
}

fn notify(options: &ErrorTipsOptions, request: Option<&RequestDescriptor>, tip: &Tip) {
    let silent = request
        .and_then(RequestDescriptor::silent)
        .unwrap_or(options.default_silent);
    if silent {
        tracing::trace!(message = %tip.message, "suppressed tip for silent request");
        return;
    }
    if let Some(notify) = &options.notify {
        notify(tip);
    }
}
