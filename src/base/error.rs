//! Request error taxonomy.

use crate::http::request::RequestDescriptor;
use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// What went wrong with a request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ErrorKind {
    /// No response was received (connection refused, reset, DNS failure...).
    #[error("Network error: {0}")]
    Network(String),
    /// The transport gave up waiting for a response.
    #[error("Request timed out")]
    Timeout,
    /// The server answered with a status the client does not accept.
    #[error("HTTP {status}")]
    Status { status: StatusCode, body: Value },
    /// The request was cancelled by key, by `cancel_all`, or superseded.
    #[error("Request cancelled")]
    Cancelled,
    /// The request could not be built (bad URL, bad header...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The request body could not be encoded.
    #[error("Failed to encode request body: {0}")]
    Encode(String),
    /// The response body could not be decoded into the requested type.
    #[error("Failed to decode response: {0}")]
    Decode(String),
    /// The response contract rejected the payload.
    #[error("Contract violation: {0}")]
    Contract(String),
    /// Transport failure that fits no other category.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Network(_) => "ERR_NETWORK",
            ErrorKind::Timeout => "ECONNABORTED",
            ErrorKind::Status { status, .. } if status.is_server_error() => "ERR_BAD_RESPONSE",
            ErrorKind::Status { .. } => "ERR_BAD_REQUEST",
            ErrorKind::Cancelled => "ERR_CANCELED",
            ErrorKind::InvalidRequest(_) => "ERR_INVALID_REQUEST",
            ErrorKind::Encode(_) => "ERR_ENCODE",
            ErrorKind::Decode(_) => "ERR_DECODE",
            ErrorKind::Contract(_) => "ERR_CONTRACT",
            ErrorKind::Other(_) => "ERR_UNKNOWN",
        }
    }
}

/// Error returned by every request operation.
///
/// Carries the classification and, when the failure happened during dispatch,
/// the descriptor that was sent.
#[derive(Debug, Error, Clone)]
#[error("{kind}")]
pub struct RequestError {
    kind: ErrorKind,
    request: Option<Box<RequestDescriptor>>,
}

impl RequestError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            request: None,
        }
    }

    /// Attach the originating request.
    pub fn with_request(mut self, request: RequestDescriptor) -> Self {
        self.request = Some(Box::new(request));
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// The request this error belongs to, if it was dispatched.
    pub fn request(&self) -> Option<&RequestDescriptor> {
        self.request.as_deref()
    }

    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match &self.kind {
            ErrorKind::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parsed body of the failed response, if one was received.
    pub fn response_body(&self) -> Option<&Value> {
        match &self.kind {
            ErrorKind::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// True when no response was received at all.
    pub fn is_network(&self) -> bool {
        matches!(self.kind, ErrorKind::Network(_) | ErrorKind::Timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s.is_server_error())
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| s.is_client_error())
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl From<ErrorKind> for RequestError {
    fn from(kind: ErrorKind) -> Self {
        RequestError::new(kind)
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        RequestError::new(ErrorKind::Decode(err.to_string()))
    }
}

impl From<url::ParseError> for RequestError {
    fn from(err: url::ParseError) -> Self {
        RequestError::new(ErrorKind::InvalidRequest(err.to_string()))
    }
}
