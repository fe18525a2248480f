use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TokenPair;
use crate::api::error::truncate_body;
use crate::api::RefreshError;

/// Exchanges a refresh token for a new token pair.
///
/// Implementations only talk to the network; persisting the result is the
/// caller's job.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError>;
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

/// `POST`s the refresh token as JSON to the refresh endpoint.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTokenRefresher {
    client: Client,
    url: String,
}

impl HttpTokenRefresher {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        if refresh_token.is_empty() {
            return Err(RefreshError::NoRefreshToken);
        }

        let response = self
            .client
            .post(&self.url)
            .header(header::ACCEPT, "application/json")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(RefreshError::no_response)?;

        let status = response.status();
        let body = response.text().await.map_err(RefreshError::no_response)?;
        debug!(status = status.as_u16(), "Refresh endpoint responded");

        if !status.is_success() {
            return Err(RefreshError::Failed {
                status: Some(status.as_u16()),
                body: truncate_body(&body),
            });
        }

        let parsed: RefreshResponse =
            serde_json::from_str(&body).map_err(|e| RefreshError::Failed {
                status: Some(status.as_u16()),
                body: format!("invalid refresh response: {}", e),
            })?;

        Ok(TokenPair::new(parsed.access_token, parsed.refresh_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_refresh_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/token/refresh")
            .match_body(Matcher::Json(serde_json::json!({ "refreshToken": "valid" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"accessToken":"new_access_1","refreshToken":"new_refresh_1"}"#)
            .expect(1)
            .create_async()
            .await;

        let refresher =
            HttpTokenRefresher::new(Client::new(), format!("{}/auth/token/refresh", server.url()));
        let pair = refresher.refresh("valid").await.unwrap();

        mock.assert_async().await;
        assert_eq!(pair, TokenPair::new("new_access_1", "new_refresh_1"));
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/token/refresh")
            .with_status(401)
            .with_body("refresh token expired")
            .create_async()
            .await;

        let refresher =
            HttpTokenRefresher::new(Client::new(), format!("{}/auth/token/refresh", server.url()));
        let err = refresher.refresh("expired").await.unwrap_err();

        assert_eq!(
            err,
            RefreshError::Failed {
                status: Some(401),
                body: "refresh token expired".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_refresh_malformed_response() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/token/refresh")
            .with_status(200)
            .with_body(r#"{"token":"missing fields"}"#)
            .create_async()
            .await;

        let refresher =
            HttpTokenRefresher::new(Client::new(), format!("{}/auth/token/refresh", server.url()));
        let err = refresher.refresh("valid").await.unwrap_err();

        assert!(matches!(err, RefreshError::Failed { status: Some(200), .. }));
    }

    #[tokio::test]
    async fn test_empty_refresh_token_skips_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let refresher = HttpTokenRefresher::new(Client::new(), server.url());
        let err = refresher.refresh("").await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err, RefreshError::NoRefreshToken);
    }
}
