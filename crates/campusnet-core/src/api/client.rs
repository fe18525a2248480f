//! API client for communicating with the campus REST backend.
//!
//! `NetworkClient` is the only way business code talks to the server. It
//! attaches the stored access token, and when the server answers 401 it
//! obtains a fresh pair through the [`RefreshCoordinator`] and retries, up to
//! `max_retry_count` times. Everything else is returned to the caller as-is.

use std::sync::Arc;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{ApiResponse, ClientError, RequestDescriptor};
use crate::auth::{
    AuthenticationPolicy, BearerPolicy, HttpTokenRefresher, RefreshCoordinator, TokenPair,
    TokenRefresher, TokenStore,
};
use crate::config::ClientConfig;

/// Authenticated API client.
/// Clone is cheap - all state lives behind one Arc and reqwest pools connections.
#[derive(Clone)]
pub struct NetworkClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    config: ClientConfig,
    store: Arc<TokenStore>,
    policy: Arc<dyn AuthenticationPolicy>,
    coordinator: RefreshCoordinator,
}

impl NetworkClient {
    /// Create a client talking to `config.base_url`, with tokens kept in `store`.
    pub fn new(config: ClientConfig, store: Arc<TokenStore>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        let refresher = HttpTokenRefresher::new(http.clone(), config.refresh_url());
        let policy = BearerPolicy::with_excluded_paths(config.unauthenticated_paths.clone());

        Ok(Self::with_parts(
            config,
            http,
            store,
            Arc::new(refresher),
            Arc::new(policy),
        ))
    }

    /// Assemble a client from explicit collaborators.
    pub fn with_parts(
        config: ClientConfig,
        http: Client,
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        policy: Arc<dyn AuthenticationPolicy>,
    ) -> Self {
        let coordinator =
            RefreshCoordinator::new(Arc::clone(&store), refresher, config.refresh_timeout());
        Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                store,
                policy,
                coordinator,
            }),
        }
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.inner.store
    }

    /// Execute `descriptor`, refreshing credentials and retrying on 401.
    ///
    /// Any response other than 401 is returned unchanged, whatever its status.
    /// A 401 that survives the retry budget becomes `RequestFailed`.
    pub async fn request(&self, descriptor: &RequestDescriptor) -> Result<ApiResponse, ClientError> {
        let inner = &self.inner;
        if !inner.policy.requires_authentication(descriptor) {
            return self.execute(descriptor).await;
        }

        let mut token = inner.store.access_token().await;
        let mut retries_left = inner.config.max_retry_count;

        loop {
            let attempt = match token {
                Some(ref token) => descriptor.with_bearer(token)?,
                None => descriptor.clone(),
            };

            let response = self.execute(&attempt).await?;
            if !inner.policy.is_unauthorized_response(&response) {
                return Ok(response);
            }

            if retries_left == 0 {
                warn!(url = %descriptor.url, "Request still unauthorized after token refresh");
                return Err(ClientError::from_status(response.status, &response.text()));
            }
            retries_left -= 1;

            debug!(url = %descriptor.url, "Access token rejected, refreshing");
            let tokens = inner.coordinator.refresh(token.as_deref()).await?;
            token = Some(tokens.access_token);
            debug!(url = %descriptor.url, retries_left, "Retrying with refreshed token");
        }
    }

    /// Execute `descriptor`, require a 2xx status, and decode the JSON body.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<T, ClientError> {
        self.request(descriptor).await?.error_for_status()?.json()
    }

    /// Store a token pair obtained by a login flow.
    pub async fn set_tokens(&self, tokens: TokenPair) -> Result<(), ClientError> {
        self.inner.store.save_pair(tokens).await?;
        info!("Signed in");
        Ok(())
    }

    /// Forget the stored credentials. Safe to call when already signed out.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.inner.store.clear().await?;
        info!("Signed out");
        Ok(())
    }

    /// Local check only; says nothing about whether the server still accepts the token.
    pub async fn is_logged_in(&self) -> bool {
        self.inner.store.access_token().await.is_some()
    }

    async fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse, ClientError> {
        let url = self.inner.config.resolve_url(&request.url);
        let url = Url::parse(&url)
            .map_err(|e| ClientError::InvalidRequest(format!("bad URL {:?}: {}", url, e)))?;

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            "Request completed"
        );

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
