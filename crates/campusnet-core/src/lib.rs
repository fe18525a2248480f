//! Authenticated network client for the campus app backend.
//!
//! Attaches bearer tokens to outgoing requests, refreshes them exactly once
//! when the server rejects them (however many requests notice at the same
//! time), retries the original request, and signs the user out when the
//! refresh itself fails.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiResponse, ClientError, NetworkClient, PersistenceError, RefreshError, RequestDescriptor};
pub use auth::{TokenPair, TokenStore};
pub use config::{ClientConfig, TokenStorage};
