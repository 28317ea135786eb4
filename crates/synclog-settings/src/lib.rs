//! # synclog-settings
//!
//! Layered configuration for synclog.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SynclogSettings::default()`]
//! 2. **User file**: `~/.synclog/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SYNCLOG_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use synclog_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("pool size: {}", settings.store.pool_size);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_settings, load_settings_from_path, resolve_db_path, settings_path,
};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`]. Falls back to compiled
/// defaults if the settings file cannot be loaded.
static SETTINGS: OnceLock<SynclogSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.synclog/settings.json` with env var
/// overrides. On subsequent calls, returns the cached value.
pub fn get_settings() -> &'static SynclogSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to load settings, using defaults");
            SynclogSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: SynclogSettings) -> std::result::Result<(), SynclogSettings> {
    SETTINGS.set(settings)
}

/// Install the global tracing subscriber described by `settings`.
pub fn init_logging(settings: &LoggingSettings) {
    if settings.json {
        synclog_core::logging::init_json_subscriber(&settings.level);
    } else {
        synclog_core::logging::init_subscriber(&settings.level);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
