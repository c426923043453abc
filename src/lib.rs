//! # requestkit
//!
//! An HTTP request core for Rust.
//!
//! `requestkit` wraps a pluggable transport with keyed request cancellation,
//! ordered interception hooks, retry with backoff, response caching and a
//! semantic verb API that returns typed data.
//!
//! ## Features
//!
//! - **Cancellation**: in-flight requests are keyed by fingerprint; duplicates
//!   can supersede each other (auto-cancel)
//! - **Retry**: exponential backoff with jitter, custom strategies and predicates
//! - **Plugins**: request/response/error hooks run in registration order
//! - **Caching**: per-call TTL cache with lazy expiry
//! - **Payload pipeline**: empty-field filtering, date rendering, encryption
//!   hooks, form encoding
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use requestkit::api::{Api, CacheOptions, RequestOptions};
//! use requestkit::Client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), requestkit::RequestError> {
//!     let client = Client::builder()
//!         .base_url("http://localhost:3000".parse()?)
//!         .build();
//!     let api = Api::new(client);
//!
//!     let users: Vec<serde_json::Value> = api
//!         .get("/users", RequestOptions::new().cache(CacheOptions::ttl(Duration::from_secs(5))))
//!         .await?;
//!     println!("{} users", users.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error taxonomy and request payloads
//! - [`http`] - Descriptors, transport, retry, cache and in-flight registry
//! - [`client`] - The cancellable, retrying request client
//! - [`plugins`] - Hook chain and the loading, logger and error-tips plugins
//! - [`api`] - Typed verb methods with caching and payload transforms
//! - [`config`] - Client defaults and deployment environment

pub mod api;
pub mod base;
pub mod client;
pub mod config;
pub mod http;
pub mod plugins;

pub use api::{Api, RequestOptions};
pub use base::{ErrorKind, Payload, RequestError};
pub use client::{Client, ClientBuilder, RequestExtras};
pub use config::{ClientConfig, EnvBaseUrls, Environment};
pub use crate::http::{RequestDescriptor, Response, RetryPolicy, Transport};
pub use plugins::Plugin;
