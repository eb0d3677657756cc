//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration for local development.

use std::path::PathBuf;
use std::time::Duration;

use blam_shared::constants::{
    DEFAULT_SEARCH_URL, RELOAD_COALESCE_MS, SEARCH_DEBOUNCE_MS, SEARCH_RESULT_LIMIT,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SQLite file backing the bundled store.
    /// Env: `BLAM_DB_PATH`
    /// Default: platform data directory (`None`).
    pub db_path: Option<PathBuf>,

    /// Base URL of the track search endpoint.
    /// Env: `BLAM_SEARCH_URL`
    /// Default: `http://localhost:3000`
    pub search_url: String,

    /// Quiet period after the last query change before searching.
    /// Env: `BLAM_SEARCH_DEBOUNCE_MS`
    /// Default: `300`
    pub search_debounce: Duration,

    /// Number of tracks requested per search.
    /// Env: `BLAM_SEARCH_LIMIT`
    /// Default: `10`
    pub search_limit: usize,

    /// Window during which realtime notifications fold into one reload.
    /// Env: `BLAM_RELOAD_COALESCE_MS`
    /// Default: `50`
    pub reload_coalesce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            search_debounce: Duration::from_millis(SEARCH_DEBOUNCE_MS),
            search_limit: SEARCH_RESULT_LIMIT,
            reload_coalesce: Duration::from_millis(RELOAD_COALESCE_MS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("BLAM_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(url) = lookup("BLAM_SEARCH_URL") {
            config.search_url = url.trim_end_matches('/').to_string();
        }

        if let Some(ms) = parse_u64(&lookup, "BLAM_SEARCH_DEBOUNCE_MS") {
            config.search_debounce = Duration::from_millis(ms);
        }

        if let Some(limit) = parse_u64(&lookup, "BLAM_SEARCH_LIMIT") {
            if limit > 0 {
                config.search_limit = limit as usize;
            }
        }

        if let Some(ms) = parse_u64(&lookup, "BLAM_RELOAD_COALESCE_MS") {
            config.reload_coalesce = Duration::from_millis(ms);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid integer, using default");
            None
        }
    }
}
