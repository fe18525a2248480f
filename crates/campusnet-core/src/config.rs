//! Client configuration management.
//!
//! Configuration is stored at `~/.config/campusnet/config.json` and falls back
//! to defaults for any field that is missing. Tokens stored in a file live at
//! `~/.cache/campusnet/tokens.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileBackend, KeychainBackend, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "campusnet";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Token file name in cache directory
const TOKEN_FILE: &str = "tokens.json";

/// Keychain entry holding the token pair
const KEYCHAIN_ACCOUNT: &str = "session";

const DEFAULT_BASE_URL: &str = "https://api.campusnet.app";
const DEFAULT_REFRESH_PATH: &str = "/auth/token/refresh";
const DEFAULT_LOGIN_PATH: &str = "/auth/login";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// The refresh call blocks every waiting request, so it gets a shorter budget.
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

/// Retries after a successful refresh. One retry; a token rejected right
/// after being issued is a terminal failure.
const DEFAULT_MAX_RETRY_COUNT: u32 = 1;

/// Where the token pair is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    Memory,
    #[default]
    File,
    Keychain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub refresh_path: String,
    pub request_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub max_retry_count: u32,
    /// Request paths sent without a bearer token.
    pub unauthenticated_paths: Vec<String>,
    pub token_storage: TokenStorage,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            unauthenticated_paths: vec![
                DEFAULT_LOGIN_PATH.to_string(),
                DEFAULT_REFRESH_PATH.to_string(),
            ],
            token_storage: TokenStorage::default(),
        }
    }
}

impl ClientConfig {
    /// Load from the default location, or defaults if no file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn token_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(TOKEN_FILE))
    }

    /// Resolve a request path against `base_url`. Absolute URLs pass through.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }

    pub fn refresh_url(&self) -> String {
        self.resolve_url(&self.refresh_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// Build the configured token store, loading any persisted tokens.
    pub fn open_token_store(&self) -> Result<TokenStore> {
        let store = match self.token_storage {
            TokenStorage::Memory => TokenStore::in_memory(),
            TokenStorage::File => TokenStore::open(FileBackend::new(Self::token_path()?))?,
            TokenStorage::Keychain => {
                TokenStore::open(KeychainBackend::new(APP_NAME, KEYCHAIN_ACCOUNT))?
            }
        };
        Ok(store)
    }
}
