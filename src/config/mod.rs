//! Configuration module for the sync gateway.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::hooks::DEFAULT_MAX_RESULTS;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite document store
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
    /// Announcement limit used when a live request does not specify one
    pub announcement_limit: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("SYNC_DB_PATH")
            .unwrap_or_else(|_| "./data/sync.sqlite".to_string())
            .into();

        let bind_addr = env::var("SYNC_BIND_ADDR")
            .ok()
            .and_then(|raw| match raw.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!("Ignoring invalid SYNC_BIND_ADDR {:?}: {}", raw, e);
                    None
                }
            })
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

        let log_level = env::var("SYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("SYNC_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let announcement_limit = env::var("SYNC_ANNOUNCEMENT_LIMIT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        Self {
            db_path,
            bind_addr,
            log_level,
            log_json,
            announcement_limit,
        }
    }
}
