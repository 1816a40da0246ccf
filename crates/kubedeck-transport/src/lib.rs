//! HTTP transport client for kubedeck
//!
//! This crate provides the single low-level request executor the typed
//! facade is built on: JSON or form bodies, per-call timeouts and header
//! overrides, and uniform error reporting for transport and HTTP failures.

mod client;
mod error;
mod http;
mod request;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::ApiClient;
pub use error::ApiError;
pub use http::HttpTransport;
pub use request::{ApiRequest, Method, RawResponse, RequestBody, RequestOptions, Transport};

// Re-export types used in our public API
pub use kubedeck_types::StatusBody;
