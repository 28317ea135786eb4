//! Share repository: share rows and their kind markers (recipients, system,
//! public).
//!
//! A share row by itself grants nothing; the kind tables say who it is for.
//! Triggers in the schema keep the kinds mutually exclusive.

use rusqlite::{Connection, params};
use synclog_core::time::now_timestamp;

use crate::errors::Result;
use crate::sqlite::row_types::ShareRow;

/// An unexpired share of a session, classified for one viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveShare {
    /// Share ID.
    pub share_id: i64,
    /// The viewer is one of this share's recipients.
    pub for_viewer: bool,
    /// This is a system-wide share.
    pub is_system: bool,
    /// This is a public link share.
    pub is_public: bool,
}

/// Share repository: stateless, every method takes `&Connection`.
pub struct ShareRepo;

impl ShareRepo {
    /// Insert a bare share row.
    pub fn insert(conn: &Connection, session_id: &str, expires_at: Option<&str>) -> Result<ShareRow> {
        let now = now_timestamp();
        let _ = conn.execute(
            "INSERT INTO session_shares (session_id, expires_at, created_at) VALUES (?1, ?2, ?3)",
            params![session_id, expires_at, now],
        )?;
        Ok(ShareRow {
            id: conn.last_insert_rowid(),
            session_id: session_id.to_string(),
            expires_at: expires_at.map(String::from),
            created_at: now,
            last_accessed_at: None,
        })
    }

    /// Mark a share as a public link.
    pub fn mark_public(conn: &Connection, share_id: i64) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO session_share_public (share_id) VALUES (?1)",
            params![share_id],
        )?;
        Ok(())
    }

    /// Mark a share as system-wide.
    pub fn mark_system(conn: &Connection, share_id: i64) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO session_share_system (share_id) VALUES (?1)",
            params![share_id],
        )?;
        Ok(())
    }

    /// Add a recipient. `user_id` is `None` for emails without an account.
    pub fn add_recipient(
        conn: &Connection,
        share_id: i64,
        email: &str,
        user_id: Option<i64>,
    ) -> Result<()> {
        let _ = conn.execute(
            "INSERT OR IGNORE INTO session_share_recipients (share_id, email, user_id)
             VALUES (?1, ?2, ?3)",
            params![share_id, email, user_id],
        )?;
        Ok(())
    }

    /// Shares of a session, newest first.
    pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<ShareRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, expires_at, created_at, last_accessed_at
             FROM session_shares WHERE session_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Recipient emails of a share, alphabetically.
    pub fn recipients(conn: &Connection, share_id: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT email FROM session_share_recipients WHERE share_id = ?1 ORDER BY email",
        )?;
        let emails = stmt
            .query_map(params![share_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(emails)
    }

    /// Whether a share is a public link.
    pub fn is_public(conn: &Connection, share_id: i64) -> Result<bool> {
        let public = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM session_share_public WHERE share_id = ?1)",
            params![share_id],
            |row| row.get(0),
        )?;
        Ok(public)
    }

    /// Delete a share if its session belongs to `owner`.
    ///
    /// Returns `false` when the share is missing or owned by someone else.
    pub fn delete_owned(conn: &Connection, share_id: i64, owner: i64) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM session_shares
             WHERE id = ?1
               AND session_id IN (SELECT id FROM sessions WHERE user_id = ?2)",
            params![share_id, owner],
        )?;
        Ok(changed > 0)
    }

    /// Record that a viewer opened the session through this share.
    pub fn touch_last_accessed(conn: &Connection, share_id: i64) -> Result<()> {
        let _ = conn.execute(
            "UPDATE session_shares SET last_accessed_at = ?2 WHERE id = ?1",
            params![share_id, now_timestamp()],
        )?;
        Ok(())
    }

    /// Unexpired shares of a session as of `now`, oldest first.
    ///
    /// A recipient entry matches the viewer by user ID, or by email for
    /// entries recorded before the viewer had an account.
    pub fn active_for_session(
        conn: &Connection,
        session_id: &str,
        viewer: Option<i64>,
        now: &str,
    ) -> Result<Vec<ActiveShare>> {
        let mut stmt = conn.prepare_cached(
            "SELECT s.id,
                    EXISTS (
                        SELECT 1 FROM session_share_recipients r
                        WHERE r.share_id = s.id
                          AND (r.user_id = ?2
                               OR r.email = (SELECT email FROM users WHERE id = ?2))
                    ),
                    EXISTS (SELECT 1 FROM session_share_system y WHERE y.share_id = s.id),
                    EXISTS (SELECT 1 FROM session_share_public p WHERE p.share_id = s.id)
             FROM session_shares s
             WHERE s.session_id = ?1
               AND (s.expires_at IS NULL OR s.expires_at > ?3)
             ORDER BY s.id ASC",
        )?;
        let shares = stmt
            .query_map(params![session_id, viewer, now], |row| {
                Ok(ActiveShare {
                    share_id: row.get(0)?,
                    for_viewer: row.get(1)?,
                    is_system: row.get(2)?,
                    is_public: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(shares)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShareRow> {
        Ok(ShareRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            expires_at: row.get(2)?,
            created_at: row.get(3)?,
            last_accessed_at: row.get(4)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
