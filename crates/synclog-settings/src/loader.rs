//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SynclogSettings::default()`]
//! 2. If `~/.synclog/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `SYNCLOG_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::SynclogSettings;

/// Resolve the synclog home directory (`~/.synclog`).
pub fn synclog_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".synclog")
}

/// Resolve the path to the settings file (`~/.synclog/settings.json`).
pub fn settings_path() -> PathBuf {
    synclog_home().join("settings.json")
}

/// Resolve the configured database path.
///
/// Absolute paths are returned unchanged; relative paths are placed under
/// [`synclog_home`]. The special value `:memory:` passes through.
pub fn resolve_db_path(settings: &SynclogSettings) -> PathBuf {
    let raw = Path::new(&settings.store.db_path);
    if raw.is_absolute() || settings.store.db_path == ":memory:" {
        raw.to_path_buf()
    } else {
        synclog_home().join(raw)
    }
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SynclogSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<SynclogSettings> {
    let defaults = serde_json::to_value(SynclogSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SynclogSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are logged and ignored (fall back to file/default)
pub fn apply_env_overrides(settings: &mut SynclogSettings) {
    // ── Store settings ──────────────────────────────────────────────
    if let Some(v) = read_env_string("SYNCLOG_DB_PATH") {
        settings.store.db_path = v;
    }
    if let Some(v) = read_env_u32("SYNCLOG_POOL_SIZE", 1, 256) {
        settings.store.pool_size = v;
    }
    if let Some(v) = read_env_u32("SYNCLOG_BUSY_TIMEOUT_MS", 0, 600_000) {
        settings.store.busy_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("SYNCLOG_CONNECT_TIMEOUT_MS", 100, 600_000) {
        settings.store.connect_timeout_ms = v;
    }

    // ── Connection retry ────────────────────────────────────────────
    if let Some(v) = read_env_u64("SYNCLOG_CONNECT_BASE_DELAY_MS", 1, 600_000) {
        settings.connect_retry.base_delay_ms = v;
    }
    if let Some(v) = read_env_u64("SYNCLOG_CONNECT_MAX_DELAY_MS", 1, 3_600_000) {
        settings.connect_retry.max_delay_ms = v;
    }

    // ── Access policy ───────────────────────────────────────────────
    if let Some(v) = read_env_bool("SYNCLOG_SHARE_ALL_SESSIONS") {
        settings.access.share_all_sessions = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("SYNCLOG_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("SYNCLOG_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Reject combinations no store can be opened with.
fn validate(settings: &SynclogSettings) -> Result<()> {
    if settings.store.pool_size == 0 {
        return Err(SettingsError::InvalidValue(
            "store.poolSize must be at least 1".to_string(),
        ));
    }
    if settings.store.db_path.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "store.dbPath must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
