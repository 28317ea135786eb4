//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file
//! format. Each type implements [`Default`] with production default values,
//! and `#[serde(default)]` lets a settings file specify only the fields it
//! changes.

mod store;

pub use store::*;

use serde::{Deserialize, Serialize};

/// Root settings type for synclog.
///
/// Loaded from `~/.synclog/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// # JSON Format
///
/// ```json
/// {
///   "store": { "dbPath": "/var/lib/synclog/data.db", "poolSize": 8 },
///   "access": { "shareAllSessions": false },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynclogSettings {
    /// Settings schema version.
    pub version: String,
    /// Database and pool settings.
    pub store: StoreSettings,
    /// Backoff for the initial connection.
    pub connect_retry: ConnectRetrySettings,
    /// Session visibility policy.
    pub access: AccessSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for SynclogSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            store: StoreSettings::default(),
            connect_retry: ConnectRetrySettings::default(),
            access: AccessSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_serializes_camel_case() {
        let json = serde_json::to_value(SynclogSettings::default()).unwrap();
        assert!(json["store"]["dbPath"].is_string());
        assert!(json["connectRetry"]["maxDelayMs"].is_number());
        assert_eq!(json["access"]["shareAllSessions"], false);
        assert_eq!(json["logging"]["level"], "info");
    }

    #[test]
    fn empty_object_gives_defaults() {
        let s: SynclogSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.version, "0.1.0");
        assert_eq!(s.store.pool_size, 16);
        assert!(!s.logging.json);
    }
}
