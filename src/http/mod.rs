pub mod hypertransport;
pub mod inflight;
pub mod request;
pub mod requestcache;
pub mod requestkey;
pub mod response;
pub mod retry;
pub mod transport;

// Re-exports for convenience
pub use hypertransport::HyperTransport;
pub use request::{Body, RequestDescriptor};
pub use requestcache::RequestCache;
pub use requestkey::request_key;
pub use response::Response;
pub use retry::{ExponentialBackoff, FixedDelay, RetryPolicy, RetryStrategy};
pub use transport::{Transport, TransportRequest, TransportResponse};
