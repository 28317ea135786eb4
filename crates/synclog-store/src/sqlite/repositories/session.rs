//! Session repository: one row per recording stream, keyed for sync clients
//! by `(user_id, external_id)`.

use rusqlite::{Connection, OptionalExtension, params};
use synclog_core::SessionId;
use synclog_core::time::now_timestamp;

use crate::errors::Result;
use crate::merge::SessionMetadata;
use crate::sqlite::row_types::{SessionRow, UserStatus};

const SESSION_COLUMNS: &str = "sessions.id, user_id, external_id, first_seen, cwd, transcript_path, \
     git_info, hostname, username, summary, first_user_message, custom_title, \
     suggested_session_title, last_sync_at, last_message_at";

/// Options for inserting a new session.
pub struct InsertSessionOptions<'a> {
    /// Owning user.
    pub user_id: i64,
    /// Client-supplied identifier.
    pub external_id: &'a str,
    /// Initial metadata, already merged onto an empty record.
    pub metadata: &'a SessionMetadata,
}

/// A session together with its owner's account details.
#[derive(Clone, Debug)]
pub struct SessionWithOwner {
    /// The session row.
    pub session: SessionRow,
    /// Owner's email address.
    pub owner_email: String,
    /// Owner's account status.
    pub owner_status: UserStatus,
}

/// Session repository: stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session with a fresh ID. `first_seen` and `last_sync_at`
    /// are both set to now.
    ///
    /// Fails with a unique violation if `(user_id, external_id)` is taken.
    pub fn insert(conn: &Connection, opts: &InsertSessionOptions<'_>) -> Result<SessionRow> {
        let id = SessionId::new();
        let now = now_timestamp();
        let m = opts.metadata;

        let _ = conn.execute(
            "INSERT INTO sessions (id, user_id, external_id, first_seen, cwd, transcript_path,
             git_info, hostname, username, summary, first_user_message, last_sync_at, last_message_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                id.as_str(),
                opts.user_id,
                opts.external_id,
                now,
                m.cwd,
                m.transcript_path,
                m.git_info,
                m.hostname,
                m.username,
                m.summary,
                m.first_user_message,
                now,
                m.last_message_at,
            ],
        )?;

        Ok(SessionRow {
            id: id.into_inner(),
            user_id: opts.user_id,
            external_id: opts.external_id.to_string(),
            first_seen: now.clone(),
            cwd: m.cwd.clone(),
            transcript_path: m.transcript_path.clone(),
            git_info: m.git_info.clone(),
            hostname: m.hostname.clone(),
            username: m.username.clone(),
            summary: m.summary.clone(),
            first_user_message: m.first_user_message.clone(),
            custom_title: None,
            suggested_session_title: None,
            last_sync_at: Some(now),
            last_message_at: m.last_message_at.clone(),
        })
    }

    /// Get session by ID.
    pub fn get_by_id(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![session_id], Self::map_row)
            .optional()?;
        Ok(row)
    }

    /// Find a user's session by its client-supplied identifier.
    pub fn find_by_external_id(
        conn: &Connection,
        user_id: i64,
        external_id: &str,
    ) -> Result<Option<SessionRow>> {
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1 AND external_id = ?2");
        let row = conn
            .query_row(&sql, params![user_id, external_id], Self::map_row)
            .optional()?;
        Ok(row)
    }

    /// Get a session joined with its owner's email and status.
    pub fn get_with_owner(conn: &Connection, session_id: &str) -> Result<Option<SessionWithOwner>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS}, users.email, users.status
             FROM sessions JOIN users ON users.id = sessions.user_id
             WHERE sessions.id = ?1"
        );
        let row = conn
            .query_row(&sql, params![session_id], |row| {
                let status: String = row.get(16)?;
                Ok(SessionWithOwner {
                    session: Self::map_row(row)?,
                    owner_email: row.get(15)?,
                    owner_status: UserStatus::from_column(&status),
                })
            })
            .optional()?;
        Ok(row)
    }

    /// Owning user of a session.
    pub fn owner_of(conn: &Connection, session_id: &str) -> Result<Option<i64>> {
        let owner = conn
            .query_row(
                "SELECT user_id FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    /// Owning user and external ID of a session.
    pub fn owner_and_external_id(
        conn: &Connection,
        session_id: &str,
    ) -> Result<Option<(i64, String)>> {
        let pair = conn
            .query_row(
                "SELECT user_id, external_id FROM sessions WHERE id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(pair)
    }

    /// Persist merged metadata and advance `last_sync_at`.
    pub fn write_metadata(
        conn: &Connection,
        session_id: &str,
        metadata: &SessionMetadata,
        last_sync_at: &str,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET cwd = ?2, transcript_path = ?3, git_info = ?4, hostname = ?5,
             username = ?6, summary = ?7, first_user_message = ?8, last_message_at = ?9,
             last_sync_at = ?10
             WHERE id = ?1",
            params![
                session_id,
                metadata.cwd,
                metadata.transcript_path,
                metadata.git_info,
                metadata.hostname,
                metadata.username,
                metadata.summary,
                metadata.first_user_message,
                metadata.last_message_at,
                last_sync_at,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Set the summary of a user's session addressed by external ID.
    pub fn update_summary_by_external_id(
        conn: &Connection,
        user_id: i64,
        external_id: &str,
        summary: Option<&str>,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET summary = ?3 WHERE user_id = ?1 AND external_id = ?2",
            params![user_id, external_id, summary],
        )?;
        Ok(changed > 0)
    }

    /// Set or clear the owner-chosen title.
    pub fn update_custom_title(
        conn: &Connection,
        session_id: &str,
        title: Option<&str>,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET custom_title = ?2 WHERE id = ?1",
            params![session_id, title],
        )?;
        Ok(changed > 0)
    }

    /// Set the generated title suggestion.
    pub fn update_suggested_title(conn: &Connection, session_id: &str, title: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET suggested_session_title = ?2 WHERE id = ?1",
            params![session_id, title],
        )?;
        Ok(changed > 0)
    }

    /// Delete a session and, by cascade, its files and shares.
    pub fn delete(conn: &Connection, session_id: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            external_id: row.get(2)?,
            first_seen: row.get(3)?,
            cwd: row.get(4)?,
            transcript_path: row.get(5)?,
            git_info: row.get(6)?,
            hostname: row.get(7)?,
            username: row.get(8)?,
            summary: row.get(9)?,
            first_user_message: row.get(10)?,
            custom_title: row.get(11)?,
            suggested_session_title: row.get(12)?,
            last_sync_at: row.get(13)?,
            last_message_at: row.get(14)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
