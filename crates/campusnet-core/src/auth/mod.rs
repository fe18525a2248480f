//! Authentication module for managing credentials and token refresh.
//!
//! This module provides:
//! - `TokenStore`: serialized, persisted storage of the current token pair
//! - `AuthenticationPolicy`: which requests carry a token, which responses reject it
//! - `TokenRefresher`: the wire call exchanging a refresh token for a new pair
//! - `RefreshCoordinator`: single-flight refresh shared by concurrent requests

pub mod coordinator;
pub mod policy;
pub mod refresh;
pub mod store;
pub mod tokens;

pub use coordinator::RefreshCoordinator;
pub use policy::{AuthenticationPolicy, BearerPolicy};
pub use refresh::{HttpTokenRefresher, TokenRefresher};
pub use store::{FileBackend, KeychainBackend, MemoryBackend, TokenBackend, TokenStore};
pub use tokens::{StoredTokens, TokenPair};
