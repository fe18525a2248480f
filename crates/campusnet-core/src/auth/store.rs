use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use keyring::Entry;
use tokio::sync::RwLock;
use tracing::debug;

use super::{StoredTokens, TokenPair};
use crate::api::PersistenceError;

/// Durable storage behind a [`TokenStore`].
///
/// Backends are only ever called while the store holds its write lock (or,
/// for `load`, before the store exists), so they need no locking of their own.
/// Calls may block; the store runs `save` and `clear` on the blocking pool.
pub trait TokenBackend: Send + Sync + 'static {
    fn load(&self) -> Result<Option<StoredTokens>, PersistenceError>;
    fn save(&self, tokens: &StoredTokens) -> Result<(), PersistenceError>;
    fn clear(&self) -> Result<(), PersistenceError>;
}

/// Keeps nothing beyond the process lifetime.
#[derive(Debug, Default)]
pub struct MemoryBackend;

impl TokenBackend for MemoryBackend {
    fn load(&self) -> Result<Option<StoredTokens>, PersistenceError> {
        Ok(None)
    }

    fn save(&self, _tokens: &StoredTokens) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Stores the token pair as JSON in a file, typically in the cache directory.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, err: impl std::fmt::Display) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }
}

impl TokenBackend for FileBackend {
    fn load(&self) -> Result<Option<StoredTokens>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let tokens = serde_json::from_str(&contents)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
        Ok(Some(tokens))
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let contents = serde_json::to_string_pretty(tokens)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;

        // Write-then-rename so a crash never leaves a half-written file behind
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| self.io_error(e))?;
        }
        Ok(())
    }
}

/// Stores the token pair in the OS keychain.
pub struct KeychainBackend {
    service: String,
    account: String,
}

impl KeychainBackend {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry, PersistenceError> {
        Entry::new(&self.service, &self.account)
            .map_err(|e| PersistenceError::Keychain(e.to_string()))
    }
}

impl TokenBackend for KeychainBackend {
    fn load(&self) -> Result<Option<StoredTokens>, PersistenceError> {
        match self.entry()?.get_password() {
            Ok(secret) => serde_json::from_str(&secret)
                .map(Some)
                .map_err(|e| PersistenceError::Corrupt(e.to_string())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(PersistenceError::Keychain(e.to_string())),
        }
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), PersistenceError> {
        let secret = serde_json::to_string(tokens)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
        self.entry()?
            .set_password(&secret)
            .map_err(|e| PersistenceError::Keychain(e.to_string()))
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(PersistenceError::Keychain(e.to_string())),
        }
    }
}

/// Single source of truth for the current credentials.
///
/// Every operation goes through one async `RwLock`: writers persist to the
/// backend and swap the in-memory copy while holding the write guard, so a
/// reader sees either the old pair or the new one, and waits at most for one
/// pending write. A failed persist leaves the in-memory pair untouched.
pub struct TokenStore {
    backend: Arc<dyn TokenBackend>,
    current: RwLock<Option<StoredTokens>>,
}

impl TokenStore {
    /// Open a store over `backend`, loading any previously persisted pair.
    pub fn open(backend: impl TokenBackend + 'static) -> Result<Self, PersistenceError> {
        let current = backend.load()?;
        debug!(has_tokens = current.is_some(), "Token store opened");
        Ok(Self {
            backend: Arc::new(backend),
            current: RwLock::new(current),
        })
    }

    /// A store that starts empty and persists nothing.
    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(MemoryBackend),
            current: RwLock::new(None),
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        let current = self.current.read().await;
        current.as_ref().map(|s| s.tokens.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        let current = self.current.read().await;
        current.as_ref().map(|s| s.tokens.refresh_token.clone())
    }

    /// Both tokens, read under one lock acquisition.
    pub async fn tokens(&self) -> Option<TokenPair> {
        let current = self.current.read().await;
        current.as_ref().map(|s| s.tokens.clone())
    }

    pub async fn saved_at(&self) -> Option<DateTime<Utc>> {
        let current = self.current.read().await;
        current.as_ref().map(|s| s.saved_at)
    }

    pub async fn save(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<(), PersistenceError> {
        self.save_pair(TokenPair::new(access_token, refresh_token)).await
    }

    pub async fn save_pair(&self, tokens: TokenPair) -> Result<(), PersistenceError> {
        let stored = StoredTokens::new(tokens);
        let mut current = self.current.write().await;
        let backend = Arc::clone(&self.backend);
        let to_save = stored.clone();
        run_blocking(move || backend.save(&to_save)).await?;
        *current = Some(stored);
        Ok(())
    }

    /// Erase both tokens. Clearing an empty store is not an error.
    ///
    /// The in-memory pair is dropped even when the backend fails, so the
    /// process is signed out either way; the backend error is still returned.
    pub async fn clear(&self) -> Result<(), PersistenceError> {
        let mut current = self.current.write().await;
        *current = None;
        let backend = Arc::clone(&self.backend);
        run_blocking(move || backend.clear()).await
    }
}

async fn run_blocking<F>(op: F) -> Result<(), PersistenceError>
where
    F: FnOnce() -> Result<(), PersistenceError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| PersistenceError::TaskFailed(e.to_string()))?
}
