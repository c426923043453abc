//! Retry policy and backoff strategies.
//!
//! A [`RetryPolicy`] is built per call: how many retries are allowed, how long
//! to wait between them, and which errors qualify.

use crate::base::error::{ErrorKind, RequestError};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Computes the wait before a retry.
///
/// `attempt` is 1 for the first retry (after the first failure).
pub trait RetryStrategy: Send + Sync {
    fn next_delay(&self, attempt: u32) -> Duration;
}

impl<F> RetryStrategy for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn next_delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// Exponential backoff with additive jitter.
///
/// `delay = min(base * 2^(attempt-1) + random[0, base), max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Base delay (default: 200ms)
    pub base: Duration,
    /// Upper bound on any delay (default: 8s)
    pub max: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            max: Duration::from_millis(8000),
        }
    }
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// The deterministic part of the delay, before jitter and capping.
    pub fn floor(&self, attempt: u32) -> Duration {
        let base_ms = duration_ms(self.base);
        let factor = 1u64 << attempt.saturating_sub(1).min(32);
        Duration::from_millis(base_ms.saturating_mul(factor))
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let base_ms = duration_ms(self.base);
        let jitter = if base_ms > 0 {
            rand::thread_rng().gen_range(0..base_ms)
        } else {
            0
        };
        let delay_ms = duration_ms(self.floor(attempt)).saturating_add(jitter);
        Duration::from_millis(delay_ms).min(self.max)
    }
}

/// Same delay for every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Predicate deciding whether an error may be retried.
pub type RetryPredicate = Arc<dyn Fn(&RequestError) -> bool + Send + Sync>;

/// Default retry predicate.
///
/// Retries when no response arrived (network failure, timeout), on 5xx, and
/// on transport errors nobody classified. Never retries 4xx, cancellation or
/// requests that could not be built.
pub fn default_retry_on(err: &RequestError) -> bool {
    match err.kind() {
        ErrorKind::Network(_) | ErrorKind::Timeout | ErrorKind::Other(_) => true,
        ErrorKind::Status { status, .. } => status.is_server_error(),
        ErrorKind::Cancelled
        | ErrorKind::InvalidRequest(_)
        | ErrorKind::Encode(_)
        | ErrorKind::Decode(_)
        | ErrorKind::Contract(_) => false,
    }
}

/// Per-call retry configuration.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt (default: 0)
    pub times: u32,
    /// Delay between attempts
    pub strategy: Arc<dyn RetryStrategy>,
    /// Which errors qualify for a retry
    pub retry_on: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            times: 0,
            strategy: Arc::new(ExponentialBackoff::default()),
            retry_on: Arc::new(default_retry_on),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("times", &self.times)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Retry up to `times` times with the default backoff and predicate.
    pub fn times(times: u32) -> Self {
        Self {
            times,
            ..Default::default()
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: impl RetryStrategy + 'static) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    #[must_use]
    pub fn with_retry_on<F>(mut self, retry_on: F) -> Self
    where
        F: Fn(&RequestError) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Arc::new(retry_on);
        self
    }

    /// Whether a call that has now failed `attempt` times may go again.
    ///
    /// Cancellation always ends the call.
    pub fn should_retry(&self, attempt: u32, err: &RequestError) -> bool {
        !err.is_cancelled() && attempt <= self.times && (self.retry_on)(err)
    }
}
