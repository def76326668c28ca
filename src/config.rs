//! Configuration file parser for ~/.config/feedscout/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each so
//! typos do not go unnoticed.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::fetcher::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_BODY_BYTES};
use crate::registry::DEFAULT_SEARCH_PAGE_SIZE;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file. Relative paths are taken from the config directory.
    pub database_path: PathBuf,

    /// Bound on one whole fetch (connect, headers and body).
    pub fetch_timeout_ms: u64,

    /// Largest response body read during discovery.
    pub max_body_bytes: usize,

    /// Lifetime of issued sessions.
    pub session_ttl_minutes: i64,

    /// Sources per search page.
    pub search_page_size: i64,

    /// Accept localhost and private-network URLs in `add`.
    pub allow_private_hosts: bool,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("sources.db"),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            session_ttl_minutes: 5,
            search_page_size: DEFAULT_SEARCH_PAGE_SIZE,
            allow_private_hosts: false,
            user_agent: format!("feedscout/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "database_path",
        "fetch_timeout_ms",
        "max_body_bytes",
        "session_ttl_minutes",
        "search_page_size",
        "allow_private_hosts",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a huge file is never pulled into memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            database = %config.database_path.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes.max(1))
    }

    /// Database path, anchored at `config_dir` when relative.
    pub fn database_path_in(&self, config_dir: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            config_dir.join(&self.database_path)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
