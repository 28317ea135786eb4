//! Parameter and projection types for the store API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use synclog_core::ExternalId;

use crate::sqlite::row_types::SyncFileRow;

// ─────────────────────────────────────────────────────────────────────────────
// Sync inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for [`super::SyncStore::find_or_create`].
#[derive(Clone, Debug, Default)]
pub struct SyncSessionParams {
    /// Client-supplied session identifier, unique per user.
    pub external_id: ExternalId,
    /// Transcript path on the client machine.
    pub transcript_path: Option<String>,
    /// Working directory.
    pub cwd: Option<String>,
    /// Git context (`{repo_url, branch, ...}`).
    pub git_info: Option<Value>,
    /// Client hostname.
    pub hostname: Option<String>,
    /// Client OS username.
    pub username: Option<String>,
}

/// One chunk's worth of progress for [`super::SyncStore::update_file_state`].
#[derive(Clone, Debug, Default)]
pub struct FileStateUpdate {
    /// File name within the session.
    pub file_name: String,
    /// File type, e.g. `transcript`, `agent`, `todo`.
    pub file_type: String,
    /// New high-water mark.
    pub last_synced_line: i64,
    /// Newest message timestamp in the chunk.
    pub last_message_at: Option<DateTime<Utc>>,
    /// Transcript summary; `Some("")` clears it.
    pub summary: Option<String>,
    /// First user message excerpt.
    pub first_user_message: Option<String>,
    /// Git context observed while syncing.
    pub git_info: Option<Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sync outputs
// ─────────────────────────────────────────────────────────────────────────────

/// Sync state of one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFileState {
    /// File name within the session.
    pub file_name: String,
    /// File type.
    pub file_type: String,
    /// High-water mark.
    pub last_synced_line: i64,
    /// Estimated number of stored chunks.
    pub chunk_count: Option<i64>,
}

impl From<SyncFileRow> for SyncFileState {
    fn from(row: SyncFileRow) -> Self {
        Self {
            file_name: row.file_name,
            file_type: row.file_type,
            last_synced_line: row.last_synced_line,
            chunk_count: row.chunk_count,
        }
    }
}

/// Result of [`super::SyncStore::find_or_create`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSession {
    /// Session ID.
    pub session_id: String,
    /// Known files keyed by name, so clients can resume where they stopped.
    pub files: HashMap<String, SyncFileState>,
    /// Whether this call created the session.
    pub created: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Access
// ─────────────────────────────────────────────────────────────────────────────

/// Why a viewer may (or may not) read a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AccessGrant {
    /// The viewer owns the session.
    Owner,
    /// The viewer is a named recipient of a share.
    #[serde(rename_all = "camelCase")]
    Recipient {
        /// The granting share.
        share_id: i64,
    },
    /// A system-wide share to every signed-in user.
    #[serde(rename_all = "camelCase")]
    System {
        /// The granting share.
        share_id: i64,
    },
    /// A public link share.
    #[serde(rename_all = "camelCase")]
    Public {
        /// The granting share.
        share_id: i64,
    },
    /// No access.
    #[serde(rename_all = "camelCase")]
    None {
        /// Signing in might grant access.
        auth_may_help: bool,
    },
}

impl AccessGrant {
    /// The share that produced this grant, if any.
    pub fn share_id(&self) -> Option<i64> {
        match *self {
            Self::Recipient { share_id }
            | Self::System { share_id }
            | Self::Public { share_id } => Some(share_id),
            Self::Owner | Self::None { .. } => None,
        }
    }

    /// Whether the grant is ownership.
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }

    /// Whether the grant allows reading.
    pub fn allows_read(&self) -> bool {
        !matches!(self, Self::None { .. })
    }

    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Recipient { .. } => "recipient",
            Self::System { .. } => "system",
            Self::Public { .. } => "public",
            Self::None { .. } => "none",
        }
    }
}

/// One file in a session detail view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFileDetail {
    /// File name.
    pub file_name: String,
    /// File type.
    pub file_type: String,
    /// High-water mark.
    pub last_synced_line: i64,
    /// Estimated number of stored chunks.
    pub chunk_count: Option<i64>,
    /// Last update timestamp.
    pub updated_at: String,
}

impl From<SyncFileRow> for SyncFileDetail {
    fn from(row: SyncFileRow) -> Self {
        Self {
            file_name: row.file_name,
            file_type: row.file_type,
            last_synced_line: row.last_synced_line,
            chunk_count: row.chunk_count,
            updated_at: row.updated_at,
        }
    }
}

/// A session as shown to one viewer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    /// Session ID.
    pub id: String,
    /// Client-supplied identifier.
    pub external_id: String,
    /// Owner-set title.
    pub custom_title: Option<String>,
    /// Generated title suggestion.
    pub suggested_session_title: Option<String>,
    /// Transcript summary.
    pub summary: Option<String>,
    /// First user message excerpt.
    pub first_user_message: Option<String>,
    /// First sync timestamp.
    pub first_seen: String,
    /// Working directory.
    pub cwd: Option<String>,
    /// Transcript path.
    pub transcript_path: Option<String>,
    /// Git context.
    pub git_info: Option<Value>,
    /// Last sync timestamp.
    pub last_sync_at: Option<String>,
    /// Newest message timestamp.
    pub last_message_at: Option<String>,
    /// Files, excluding `todo` files.
    pub files: Vec<SyncFileDetail>,
    /// Client hostname; owner only.
    pub hostname: Option<String>,
    /// Client OS username; owner only.
    pub username: Option<String>,
    /// Whether the viewer owns the session.
    pub is_owner: bool,
    /// Owner's email, for non-owners.
    pub shared_by_email: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Listing
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for [`super::SessionLister::list_sessions`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionListParams {
    /// Free-text search over titles, summary and first message.
    pub query: Option<String>,
    /// Keep sessions in these repositories (`org/repo`).
    pub repos: Vec<String>,
    /// Keep sessions on these branches.
    pub branches: Vec<String>,
    /// Keep sessions owned by these emails, case-insensitively.
    pub owners: Vec<String>,
    /// Opaque position returned as `next_cursor` by the previous page.
    pub cursor: Option<String>,
    /// Sessions per page; 0 selects the default.
    pub page_size: usize,
}

/// How the viewer reaches a listed session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAccessType {
    /// The viewer owns it.
    Owner,
    /// A recipient share names the viewer.
    PrivateShare,
    /// A system share, or share-all.
    SystemShare,
}

/// One session in a list page.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListItem {
    /// Session ID.
    pub id: String,
    /// Client-supplied identifier.
    pub external_id: String,
    /// First sync timestamp.
    pub first_seen: String,
    /// Last sync timestamp.
    pub last_sync_at: Option<String>,
    /// Newest message timestamp.
    pub last_message_at: Option<String>,
    /// Owner-set title.
    pub custom_title: Option<String>,
    /// Generated title suggestion.
    pub suggested_session_title: Option<String>,
    /// Transcript summary.
    pub summary: Option<String>,
    /// First user message excerpt.
    pub first_user_message: Option<String>,
    /// Number of synced files.
    pub file_count: i64,
    /// Sum of the files' high-water marks.
    pub total_lines: i64,
    /// Repository name derived from the remote URL.
    pub git_repo: Option<String>,
    /// Remote URL.
    pub git_repo_url: Option<String>,
    /// Branch.
    pub git_branch: Option<String>,
    /// Whether the viewer owns the session.
    pub is_owner: bool,
    /// How the viewer reaches the session.
    pub access_type: SessionAccessType,
    /// Owner's email, for non-owners.
    pub shared_by_email: Option<String>,
    /// Owner's email.
    pub owner_email: String,
    /// Client hostname; owner only.
    pub hostname: Option<String>,
    /// Client OS username; owner only.
    pub username: Option<String>,
}

/// Values the list can be filtered by.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFilterOptions {
    /// Repository names.
    pub repos: Vec<String>,
    /// Branches.
    pub branches: Vec<String>,
    /// Owner emails, lowercase.
    pub owners: Vec<String>,
}

/// One page of [`super::SessionLister::list_sessions`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListResult {
    /// Sessions, newest activity first.
    pub sessions: Vec<SessionListItem>,
    /// Whether another page follows.
    pub has_more: bool,
    /// Cursor for the next page when `has_more`.
    pub next_cursor: Option<String>,
    /// Effective page size.
    pub page_size: usize,
    /// Filter values available to the viewer.
    pub filter_options: SessionFilterOptions,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shares
// ─────────────────────────────────────────────────────────────────────────────

/// A share as listed to its owner.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionShare {
    /// Share ID.
    pub id: i64,
    /// Shared session.
    pub session_id: String,
    /// The session's client-supplied identifier.
    pub external_id: String,
    /// Whether this is a public link.
    pub is_public: bool,
    /// Expiry; `None` never expires.
    pub expires_at: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last access through this share.
    pub last_accessed_at: Option<String>,
    /// Recipient emails (empty for public and system shares).
    pub recipients: Vec<String>,
}

/// Parameters for [`super::ShareStore::create_share`].
#[derive(Clone, Debug, Default)]
pub struct CreateShareParams {
    /// Session to share.
    pub session_id: String,
    /// Make a public link instead of a recipient share.
    pub is_public: bool,
    /// Expiry; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Recipient emails; ignored for public shares.
    pub recipient_emails: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
