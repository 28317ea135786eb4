//! Database row types for mapping between `SQLite` rows and Rust structs.
//!
//! These represent the raw row shape. Timestamps stay as the persisted
//! RFC 3339 strings; JSON columns stay as text. Conversion to the public
//! projections in [`crate::store::types`] happens in the store layer.

use serde::{Deserialize, Serialize};

/// Account status of a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Normal account.
    Active,
    /// Deactivated by an administrator; owned sessions are hidden.
    Inactive,
}

impl UserStatus {
    /// Column value for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parse a column value. Unknown values are treated as inactive.
    pub fn from_column(raw: &str) -> Self {
        if raw == "active" {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

/// Raw user row from the `users` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRow {
    /// User ID.
    pub id: i64,
    /// Email address (unique, case-insensitive).
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Account status.
    pub status: UserStatus,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw session row from the `sessions` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRow {
    /// Session ID (UUID).
    pub id: String,
    /// Owning user.
    pub user_id: i64,
    /// Client-supplied identifier.
    pub external_id: String,
    /// When the session was first synced.
    pub first_seen: String,
    /// Working directory.
    pub cwd: Option<String>,
    /// Transcript path on the client machine.
    pub transcript_path: Option<String>,
    /// Git context as JSON text.
    pub git_info: Option<String>,
    /// Client machine hostname.
    pub hostname: Option<String>,
    /// OS username on the client machine.
    pub username: Option<String>,
    /// Latest transcript summary.
    pub summary: Option<String>,
    /// First user message excerpt.
    pub first_user_message: Option<String>,
    /// Owner-set title.
    pub custom_title: Option<String>,
    /// Generated title suggestion.
    pub suggested_session_title: Option<String>,
    /// Last sync timestamp.
    pub last_sync_at: Option<String>,
    /// Newest message timestamp seen in any file.
    pub last_message_at: Option<String>,
}

/// Raw sync file row from the `sync_files` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncFileRow {
    /// Owning session.
    pub session_id: String,
    /// File name within the session.
    pub file_name: String,
    /// File type, e.g. `transcript` or `agent`.
    pub file_type: String,
    /// High-water mark.
    pub last_synced_line: i64,
    /// Estimated number of stored chunks.
    pub chunk_count: Option<i64>,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Raw share row from the `session_shares` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShareRow {
    /// Share ID.
    pub id: i64,
    /// Shared session.
    pub session_id: String,
    /// Expiry; `None` never expires.
    pub expires_at: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last time a viewer opened the session through this share.
    pub last_accessed_at: Option<String>,
}

/// Raw quota row from the `smart_recap_quota` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRow {
    /// Owning user.
    pub user_id: i64,
    /// Computations in the current window.
    pub compute_count: i64,
    /// Last computation timestamp.
    pub last_compute_at: Option<String>,
    /// Last window reset timestamp.
    pub quota_reset_at: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
