//! Storage, connection retry, and access-policy settings.

use serde::{Deserialize, Serialize};
use synclog_core::RetryConfig;

/// `SQLite` storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Database file path (relative paths resolve against `~/.synclog`).
    pub db_path: String,
    /// Maximum connection pool size.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Page cache size in KiB.
    pub cache_size_kib: i64,
    /// How long a pool checkout may wait for a connection, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: "synclog.db".to_string(),
            pool_size: 16,
            busy_timeout_ms: 5_000,
            cache_size_kib: 8192,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Backoff for establishing the initial database connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectRetrySettings {
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter factor (0.0–1.0) applied to retry delays.
    pub jitter_factor: f64,
}

impl Default for ConnectRetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            base_delay_ms: defaults.base_delay_ms,
            max_delay_ms: defaults.max_delay_ms,
            jitter_factor: defaults.jitter_factor,
        }
    }
}

impl From<&ConnectRetrySettings> for RetryConfig {
    fn from(s: &ConnectRetrySettings) -> Self {
        Self {
            base_delay_ms: s.base_delay_ms,
            max_delay_ms: s.max_delay_ms,
            jitter_factor: s.jitter_factor.clamp(0.0, 1.0),
        }
    }
}

/// Session visibility policy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessSettings {
    /// Grant every signed-in user system-level read access to every session.
    pub share_all_sessions: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
