//! Client configuration.
//!
//! Values come from a JSON file, then environment variables override them.
//! Every field is optional: without a backend URL the store simply runs
//! local-only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mirror::DEFAULT_MIRROR_TIMEOUT;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const ENV_API_BASE: &str = "WAYFARE_API_BASE";
pub const ENV_DB_PATH: &str = "WAYFARE_DB_PATH";
pub const ENV_USER_ID: &str = "WAYFARE_USER_ID";
pub const ENV_MIRROR_TIMEOUT_MS: &str = "WAYFARE_MIRROR_TIMEOUT_MS";
pub const ENV_AUTH_TOKEN: &str = "WAYFARE_AUTH_TOKEN";

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Travel backend base URL, e.g. `http://localhost:8083`
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Owner stamped on new records
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub mirror_timeout_ms: Option<u64>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field("db_path", &self.db_path)
            .field("user_id", &self.user_id)
            .field("mirror_timeout_ms", &self.mirror_timeout_ms)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Parse a JSON config document.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(raw)
            .map_err(|error| Error::Config(format!("invalid config JSON: {error}")))?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the default config.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
            .map_err(|error| Error::Config(format!("{}: {}", path.display(), error)))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut normalized = self.clone();
        normalized.normalize();
        normalized.validate()?;
        std::fs::write(path, serde_json::to_string_pretty(&normalized)?)?;
        Ok(())
    }

    /// Apply `WAYFARE_*` environment variables on top of this config.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (keyed by environment variable name).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| normalize_text_option(lookup(key));

        if let Some(url) = value(ENV_API_BASE) {
            self.api_base_url = Some(url);
        }
        if let Some(path) = value(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(user) = value(ENV_USER_ID) {
            self.user_id = Some(user);
        }
        if let Some(raw) = value(ENV_MIRROR_TIMEOUT_MS) {
            let millis = raw.parse().map_err(|_| {
                Error::Config(format!(
                    "{ENV_MIRROR_TIMEOUT_MS} must be a whole number of milliseconds, got '{raw}'"
                ))
            })?;
            self.mirror_timeout_ms = Some(millis);
        }
        if let Some(token) = value(ENV_AUTH_TOKEN) {
            self.auth_token = Some(token);
        }

        self.normalize();
        self.validate()?;
        Ok(self)
    }

    pub fn normalize(&mut self) {
        self.api_base_url = normalize_text_option(self.api_base_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.user_id = normalize_text_option(self.user_id.take());
        self.auth_token = normalize_text_option(self.auth_token.take());
        if self
            .db_path
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            self.db_path = None;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = self.api_base_url.as_deref() {
            if !is_http_url(url) {
                return Err(Error::Config(format!(
                    "api_base_url must include http:// or https:// (got '{url}')"
                )));
            }
        }
        if self.mirror_timeout_ms == Some(0) {
            return Err(Error::Config(
                "mirror_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn mirror_timeout(&self) -> Duration {
        self.mirror_timeout_ms
            .map_or(DEFAULT_MIRROR_TIMEOUT, Duration::from_millis)
    }

    /// Whether records should be mirrored to a backend.
    pub const fn is_remote_enabled(&self) -> bool {
        self.api_base_url.is_some()
    }
}
