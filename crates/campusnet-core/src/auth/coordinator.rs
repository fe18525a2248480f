//! Single-flight token refresh.
//!
//! However many requests discover an expired access token at the same time,
//! at most one refresh call is in flight. The first caller starts it, later
//! callers subscribe to the same outcome, and everyone receives an identical
//! result once it settles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use super::{TokenPair, TokenRefresher, TokenStore};
use crate::api::RefreshError;

type RefreshOutcome = Result<TokenPair, RefreshError>;

enum RefreshState {
    Idle,
    /// Receiver for the outcome of the one running refresh.
    InFlight(watch::Receiver<Option<RefreshOutcome>>),
}

pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    store: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    refresh_timeout: Duration,
    state: Mutex<RefreshState>,
    episodes: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                refresher,
                refresh_timeout,
                state: Mutex::new(RefreshState::Idle),
                episodes: AtomicU64::new(0),
            }),
        }
    }

    /// Obtain a fresh token pair after `rejected_access` was refused.
    ///
    /// Joins the running refresh if there is one. If the store already holds
    /// a different access token than the rejected one, an earlier refresh has
    /// replaced it and that pair is returned without a network call.
    ///
    /// Dropping the returned future only stops this caller from waiting; the
    /// refresh itself always runs to completion.
    pub async fn refresh(&self, rejected_access: Option<&str>) -> Result<TokenPair, RefreshError> {
        let mut outcome = {
            let mut state = self.inner.state.lock().await;
            match &*state {
                // A closed channel means the refresh task died; start over.
                RefreshState::InFlight(rx) if rx.has_changed().is_ok() => {
                    debug!("Joining in-flight token refresh");
                    rx.clone()
                }
                _ => {
                    // The refresh token is read here, as the episode starts.
                    let current = match self.inner.store.tokens().await {
                        Some(current) if !current.refresh_token.is_empty() => current,
                        _ => {
                            debug!("Refresh needed but no refresh token is stored");
                            return Err(RefreshError::NoRefreshToken);
                        }
                    };
                    if rejected_access != Some(current.access_token.as_str()) {
                        debug!("Access token was already replaced, reusing it");
                        return Ok(current);
                    }

                    let (tx, rx) = watch::channel(None);
                    *state = RefreshState::InFlight(rx.clone());
                    let episode = self.inner.episodes.fetch_add(1, Ordering::Relaxed) + 1;
                    tokio::spawn(Arc::clone(&self.inner).run(current.refresh_token, tx, episode));
                    rx
                }
            }
        };

        let settled = match outcome.wait_for(Option::is_some).await {
            Ok(settled) => settled.clone(),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| Err(RefreshError::no_response("refresh ended without an outcome")))
    }

    /// True while a refresh call is outstanding.
    pub async fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock().await, RefreshState::InFlight(_))
    }
}

impl CoordinatorInner {
    async fn run(
        self: Arc<Self>,
        refresh_token: String,
        outcome: watch::Sender<Option<RefreshOutcome>>,
        episode: u64,
    ) {
        info!(episode, "Refreshing access token");

        let result =
            match tokio::time::timeout(self.refresh_timeout, self.refresher.refresh(&refresh_token))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(RefreshError::no_response(format!(
                    "timed out after {}ms",
                    self.refresh_timeout.as_millis()
                ))),
            };

        let result = match result {
            Ok(tokens) => match self.store.save_pair(tokens.clone()).await {
                Ok(()) => {
                    info!(episode, "Access token refreshed");
                    Ok(tokens)
                }
                Err(e) => {
                    error!(episode, error = %e, "Failed to store refreshed tokens");
                    Err(RefreshError::Persistence(e))
                }
            },
            Err(e) => {
                warn!(episode, error = %e, "Token refresh failed, signing out");
                match self.store.clear().await {
                    Ok(()) => Err(e),
                    Err(clear_err) => {
                        error!(episode, error = %clear_err, "Failed to clear tokens after refresh failure");
                        Err(RefreshError::Persistence(clear_err))
                    }
                }
            }
        };

        // Back to Idle and publish under the state lock, so no caller can
        // start a new episode between the two.
        let mut state = self.state.lock().await;
        *state = RefreshState::Idle;
        outcome.send_replace(Some(result));
    }
}
