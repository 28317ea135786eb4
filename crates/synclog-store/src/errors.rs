//! Error types for the session store.
//!
//! [`StoreError`] is returned by every store operation. Callers branch on the
//! typed conditions (`*NotFound`, [`StoreError::Forbidden`],
//! [`StoreError::OwnerInactive`], ...) and treat the wrapped storage variants
//! as fatal. Uniqueness conflicts raised while creating a session are
//! resolved inside the reconciler and never reach callers.

use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Filesystem error while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Session does not exist, or the identifier is not a valid session ID.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// No sync file with this name is tracked for the session.
    #[error("file not found: {file_name} in session {session_id}")]
    FileNotFound {
        /// Session the lookup was scoped to.
        session_id: String,
        /// File name that was looked up.
        file_name: String,
    },

    /// Share does not exist.
    #[error("share not found: {0}")]
    ShareNotFound(i64),

    /// User does not exist.
    #[error("user not found: {0}")]
    UserNotFound(i64),

    /// No quota record has been created for the user.
    #[error("no quota record found for user {0}")]
    QuotaNotFound(i64),

    /// The entity exists but the caller may not access it.
    #[error("forbidden")]
    Forbidden,

    /// The caller does not own the entity it tried to change.
    #[error("unauthorized")]
    Unauthorized,

    /// The session's owner account is deactivated.
    #[error("session owner is inactive")]
    OwnerInactive,

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal error (e.g. a background task panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Whether this is a "does not exist" condition of any kind.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::FileNotFound { .. }
                | Self::ShareNotFound(_)
                | Self::UserNotFound(_)
                | Self::QuotaNotFound(_)
        )
    }
}

/// Whether `err` is a `UNIQUE` or `PRIMARY KEY` constraint violation.
///
/// Decided from the extended result code only; message text is never
/// inspected.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => {
            code.code == ErrorCode::ConstraintViolation
                && matches!(
                    code.extended_code,
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        }
        _ => false,
    }
}

/// Whether `err` is a `FOREIGN KEY` constraint violation.
pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => {
            code.code == ErrorCode::ConstraintViolation
                && code.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        }
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
