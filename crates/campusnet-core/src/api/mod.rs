//! REST API client module for the campus backend.
//!
//! This module provides the `NetworkClient`, which attaches bearer tokens
//! to outgoing requests, refreshes them once when the server answers 401,
//! and retries the original request with the new token.

pub mod client;
pub mod error;
pub mod request;

pub use client::NetworkClient;
pub use error::{ClientError, PersistenceError, RefreshError};
pub use request::{ApiResponse, RequestDescriptor};
