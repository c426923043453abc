//! Base types and error handling.
//!
//! - [`RequestError`] / [`ErrorKind`]: the request failure taxonomy
//! - [`Payload`]: structured request data with ordered keys and dates

pub mod error;
pub mod payload;

pub use error::{ErrorKind, RequestError};
pub use payload::Payload;
