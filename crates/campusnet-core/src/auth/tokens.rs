use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An access/refresh token pair.
///
/// Produced by a login flow or by a token refresh, and owned by the
/// [`TokenStore`](super::TokenStore). Other components only hold a copy for
/// the lifetime of a single request attempt.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Keep credentials out of logs and panic messages.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// The persisted form of a token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub saved_at: DateTime<Utc>,
}

impl StoredTokens {
    pub fn new(tokens: TokenPair) -> Self {
        Self {
            tokens,
            saved_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = TokenPair::new("secret_access", "secret_refresh");
        let printed = format!("{:?}", pair);
        assert!(!printed.contains("secret_access"));
        assert!(!printed.contains("secret_refresh"));
    }

    #[test]
    fn test_stored_tokens_json_layout() {
        let stored = StoredTokens::new(TokenPair::new("a", "r"));
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["accessToken"], "a");
        assert_eq!(value["refreshToken"], "r");
        assert!(value.get("saved_at").is_some());
    }
}
