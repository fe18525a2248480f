use std::path::PathBuf;

use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No refresh token stored - please log in again")]
    NoRefreshToken,

    #[error("Token refresh failed ({}): {body}", describe_status(*status))]
    TokenRefreshFailed { status: Option<u16>, body: String },

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Token storage error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ClientError::RequestFailed {
            status: status.as_u16(),
            body: truncate_body(body),
        }
    }

    /// True when the stored credentials are gone and the user has to sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ClientError::NoRefreshToken | ClientError::TokenRefreshFailed { .. }
        )
    }
}

fn describe_status(status: Option<u16>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no response".to_string(),
    }
}

/// Outcome of a failed refresh episode. Cloned to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token stored")]
    NoRefreshToken,

    #[error("Refresh call failed ({}): {body}", describe_status(*status))]
    Failed { status: Option<u16>, body: String },

    #[error("Failed to store refreshed tokens: {0}")]
    Persistence(PersistenceError),
}

impl RefreshError {
    /// A refresh attempt that never got an HTTP response (timeout, connection failure).
    pub fn no_response(reason: impl std::fmt::Display) -> Self {
        RefreshError::Failed {
            status: None,
            body: reason.to_string(),
        }
    }
}

impl From<RefreshError> for ClientError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::NoRefreshToken => ClientError::NoRefreshToken,
            RefreshError::Failed { status, body } => ClientError::TokenRefreshFailed { status, body },
            RefreshError::Persistence(e) => ClientError::Persistence(e),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Failed to access {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Stored token data is corrupt: {0}")]
    Corrupt(String),

    /// The blocking storage task panicked or was aborted.
    #[error("Token storage task failed: {0}")]
    TaskFailed(String),
}
