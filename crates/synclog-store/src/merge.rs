//! Field-level merge policy for session metadata.
//!
//! Every sync call carries a partial view of the session's metadata. Each
//! stored field is combined with its incoming value by one small strategy
//! function, and [`apply`] is the table that assigns a strategy to every
//! field:
//!
//! | Field | Strategy |
//! |-------|----------|
//! | `cwd`, `transcript_path`, `hostname`, `username` | [`overwrite_if_present`] |
//! | `last_message_at` | [`max_timestamp`] |
//! | `summary` | [`overwrite_allow_clear`] |
//! | `first_user_message` | [`first_write_wins`] |
//! | `git_info` | [`raw_overwrite`] |
//!
//! `last_sync_at` is not part of the merge; it is always advanced by the
//! caller.

use chrono::{DateTime, Utc};
use serde_json::Value;
use synclog_core::time::{format_timestamp, parse_timestamp};

use crate::sqlite::row_types::SessionRow;

/// Incoming metadata from one sync call. `None` means "not supplied".
#[derive(Clone, Debug, Default)]
pub struct MetadataPatch<'a> {
    /// Working directory.
    pub cwd: Option<&'a str>,
    /// Transcript path on the client machine.
    pub transcript_path: Option<&'a str>,
    /// Client hostname.
    pub hostname: Option<&'a str>,
    /// Client OS username.
    pub username: Option<&'a str>,
    /// Git context blob.
    pub git_info: Option<&'a Value>,
    /// Transcript summary; `Some("")` clears the stored value.
    pub summary: Option<&'a str>,
    /// First user message excerpt.
    pub first_user_message: Option<&'a str>,
    /// Timestamp of the newest message in the uploaded lines.
    pub last_message_at: Option<DateTime<Utc>>,
}

/// The mergeable subset of a stored session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    /// Working directory.
    pub cwd: Option<String>,
    /// Transcript path.
    pub transcript_path: Option<String>,
    /// Client hostname.
    pub hostname: Option<String>,
    /// Client OS username.
    pub username: Option<String>,
    /// Git context as JSON text.
    pub git_info: Option<String>,
    /// Transcript summary.
    pub summary: Option<String>,
    /// First user message excerpt.
    pub first_user_message: Option<String>,
    /// Newest message timestamp.
    pub last_message_at: Option<String>,
}

impl From<&SessionRow> for SessionMetadata {
    fn from(row: &SessionRow) -> Self {
        Self {
            cwd: row.cwd.clone(),
            transcript_path: row.transcript_path.clone(),
            hostname: row.hostname.clone(),
            username: row.username.clone(),
            git_info: row.git_info.clone(),
            summary: row.summary.clone(),
            first_user_message: row.first_user_message.clone(),
            last_message_at: row.last_message_at.clone(),
        }
    }
}

/// Merge `patch` into `current` field by field.
pub fn apply(current: SessionMetadata, patch: &MetadataPatch<'_>) -> SessionMetadata {
    SessionMetadata {
        cwd: overwrite_if_present(current.cwd, patch.cwd),
        transcript_path: overwrite_if_present(current.transcript_path, patch.transcript_path),
        hostname: overwrite_if_present(current.hostname, patch.hostname),
        username: overwrite_if_present(current.username, patch.username),
        git_info: raw_overwrite(current.git_info, patch.git_info),
        summary: overwrite_allow_clear(current.summary, patch.summary),
        first_user_message: first_write_wins(current.first_user_message, patch.first_user_message),
        last_message_at: max_timestamp(current.last_message_at, patch.last_message_at),
    }
}

/// Replace with a non-empty incoming value; keep the stored value otherwise.
pub fn overwrite_if_present(current: Option<String>, incoming: Option<&str>) -> Option<String> {
    match incoming {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => current,
    }
}

/// Keep the later of the stored and incoming timestamps.
///
/// A stored value that cannot be parsed loses to any incoming value.
pub fn max_timestamp(current: Option<String>, incoming: Option<DateTime<Utc>>) -> Option<String> {
    let Some(incoming) = incoming else {
        return current;
    };
    match current.as_deref().and_then(parse_timestamp) {
        Some(stored) if stored >= incoming => current,
        _ => Some(format_timestamp(incoming)),
    }
}

/// Replace whenever a value is supplied. An empty string clears the field.
pub fn overwrite_allow_clear(current: Option<String>, incoming: Option<&str>) -> Option<String> {
    match incoming {
        Some("") => None,
        Some(value) => Some(value.to_string()),
        None => current,
    }
}

/// Set only while the stored value is unset.
pub fn first_write_wins(current: Option<String>, incoming: Option<&str>) -> Option<String> {
    match current {
        Some(existing) if !existing.is_empty() => Some(existing),
        _ => incoming.filter(|v| !v.is_empty()).map(String::from),
    }
}

/// Replace the stored JSON blob wholesale. Null and `{}` keep the stored blob.
pub fn raw_overwrite(current: Option<String>, incoming: Option<&Value>) -> Option<String> {
    match incoming {
        Some(Value::Null) | None => current,
        Some(Value::Object(map)) if map.is_empty() => current,
        Some(value) => Some(value.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
