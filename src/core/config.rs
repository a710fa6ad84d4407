//! Configuration for the chat backend, store adapters and console.
//!
//! Every adapter receives the section it needs at construction; nothing reads
//! process-wide state after [`ChatConfig::from_env`] returns.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::errors::{ChatError, ChatResult};

/// Prefix shared by every environment variable read by [`ChatConfig::from_env`].
pub const ENV_PREFIX: &str = "ENGICHAT_";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Managed backend (row storage + chat function) settings.
    pub backend: BackendConfig,
    /// Store selection.
    pub storage: StorageConfig,
    /// Responder selection and call policy.
    pub responder: ResponderConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Console session settings.
    pub session: SessionConfig,
}

impl ChatConfig {
    /// Load configuration from `ENGICHAT_*` environment variables over defaults.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Keys are the full variable names, e.g. `ENGICHAT_BACKEND_URL`.
    ///
    /// # Errors
    /// Returns an error if a value cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = get("BACKEND_URL") {
            config.backend.url = Some(url);
        }
        if let Some(key) = get("BACKEND_KEY") {
            config.backend.anon_key = key;
        }
        if let Some(kind) = get("STORAGE") {
            config.storage.kind = match kind.as_str() {
                "sqlite" => StorageKind::Sqlite,
                "rest" => StorageKind::Rest,
                other => {
                    return Err(ChatError::InvalidConfig(format!(
                        "unknown storage kind: {other}"
                    )));
                }
            };
        }
        if let Some(path) = get("SQLITE_PATH") {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(mode) = get("RESPONDER") {
            config.responder.mode = match mode.as_str() {
                "local" => ResponderMode::Local,
                "http" => ResponderMode::Http,
                other => {
                    return Err(ChatError::InvalidConfig(format!(
                        "unknown responder mode: {other}"
                    )));
                }
            };
        }
        if let Some(secs) = get("RESPONDER_TIMEOUT_SECS") {
            config.responder.timeout_secs = parse_number("RESPONDER_TIMEOUT_SECS", &secs)?;
        }
        if let Some(retries) = get("RESPONDER_RETRIES") {
            config.responder.max_retries = parse_number("RESPONDER_RETRIES", &retries)?;
        }
        if let Some(backoff) = get("RESPONDER_BACKOFF_MS") {
            config.responder.retry_backoff_ms = parse_number("RESPONDER_BACKOFF_MS", &backoff)?;
        }
        if let Some(port) = get("PORT") {
            config.server.port = parse_number("PORT", &port)?;
        }
        if let Some(key) = get("API_KEY") {
            config.server.api_key = Some(key);
        }
        if let Some(profile) = get("PROFILE_ID") {
            config.session.profile_id = Some(profile);
        }
        if let Some(email) = get("PROFILE_EMAIL") {
            config.session.email = email;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        if let Some(url) = &self.backend.url {
            Url::parse(url)?;
        }

        let needs_backend = self.storage.kind == StorageKind::Rest
            || self.responder.mode == ResponderMode::Http;
        if needs_backend && self.backend.url.is_none() {
            return Err(ChatError::InvalidConfig(
                "backend.url is required for rest storage or http responder".to_string(),
            ));
        }

        if self.responder.timeout_secs == 0 {
            return Err(ChatError::InvalidConfig(
                "responder.timeout_secs must be > 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ChatError::InvalidConfig(
                "server.port must be > 0".to_string(),
            ));
        }

        if let Some(profile) = &self.session.profile_id {
            profile.parse::<uuid::Uuid>().map_err(|err| {
                ChatError::InvalidConfig(format!("session.profile_id is not a uuid: {err}"))
            })?;
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> ChatResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ChatError::InvalidConfig(format!("{ENV_PREFIX}{name} is not a number: {raw}")))
}

/// Managed backend settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend (e.g. `https://project.example.co`).
    pub url: Option<String>,
    /// Public (anon) key sent as `apikey` and bearer token.
    pub anon_key: String,
}

impl BackendConfig {
    /// Parsed base URL.
    ///
    /// # Errors
    /// Returns an error if no URL is configured or it does not parse.
    pub fn base_url(&self) -> ChatResult<Url> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| ChatError::InvalidConfig("backend.url is not set".to_string()))?;
        Ok(Url::parse(raw)?)
    }
}

/// Which store implementation to use.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Local `SQLite` file.
    #[default]
    Sqlite,
    /// Managed PostgREST-style backend.
    Rest,
}

/// Store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store implementation.
    pub kind: StorageKind,
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Sqlite,
            sqlite_path: PathBuf::from("engichat.sqlite3"),
        }
    }
}

/// Which responder implementation the console talks to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderMode {
    /// In-process rule responder.
    #[default]
    Local,
    /// Chat function over HTTP.
    Http,
}

/// Responder settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Responder implementation.
    pub mode: ResponderMode,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Extra attempts after a retryable failure.
    pub max_retries: u32,
    /// Initial backoff between attempts, doubled each time.
    pub retry_backoff_ms: u64,
}

impl ResponderConfig {
    /// Per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Initial retry backoff.
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            mode: ResponderMode::Local,
            timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
    /// Bearer token required on the chat function, if set.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            api_key: None,
        }
    }
}

/// Console session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Profile to act as; a local profile is created when unset.
    pub profile_id: Option<String>,
    /// Email recorded on the local profile.
    pub email: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile_id: None,
            email: "local@engichat.dev".to_string(),
        }
    }
}
