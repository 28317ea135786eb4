//! User repository: the account rows that own sessions and receive shares.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};
use synclog_core::time::now_timestamp;

use crate::errors::Result;
use crate::sqlite::row_types::{UserRow, UserStatus};

/// Options for creating a user.
pub struct CreateUserOptions<'a> {
    /// Email address.
    pub email: &'a str,
    /// Optional display name.
    pub name: Option<&'a str>,
}

/// User repository: stateless, every method takes `&Connection`.
pub struct UserRepo;

impl UserRepo {
    /// Create a new active user.
    pub fn create(conn: &Connection, opts: &CreateUserOptions<'_>) -> Result<UserRow> {
        let now = now_timestamp();
        let _ = conn.execute(
            "INSERT INTO users (email, name, status, created_at) VALUES (?1, ?2, 'active', ?3)",
            params![opts.email, opts.name, now],
        )?;
        Ok(UserRow {
            id: conn.last_insert_rowid(),
            email: opts.email.to_string(),
            name: opts.name.map(String::from),
            status: UserStatus::Active,
            created_at: now,
        })
    }

    /// Get user by ID.
    pub fn get_by_id(conn: &Connection, user_id: i64) -> Result<Option<UserRow>> {
        let row = conn
            .query_row(
                "SELECT id, email, name, status, created_at FROM users WHERE id = ?1",
                params![user_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Get user by email, ignoring case.
    pub fn get_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
        let row = conn
            .query_row(
                "SELECT id, email, name, status, created_at FROM users WHERE email = ?1 COLLATE NOCASE",
                params![email],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Resolve user IDs for a batch of emails.
    ///
    /// Keys of the returned map are lowercased; emails with no account are
    /// absent.
    pub fn ids_by_emails(conn: &Connection, emails: &[&str]) -> Result<HashMap<String, i64>> {
        let mut found = HashMap::with_capacity(emails.len());
        let mut stmt =
            conn.prepare_cached("SELECT id FROM users WHERE email = ?1 COLLATE NOCASE")?;
        for email in emails {
            if let Some(id) = stmt
                .query_row(params![email], |row| row.get::<_, i64>(0))
                .optional()?
            {
                let _ = found.insert(email.to_lowercase(), id);
            }
        }
        Ok(found)
    }

    /// Set account status. Returns `false` when the user does not exist.
    pub fn update_status(conn: &Connection, user_id: i64, status: UserStatus) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE users SET status = ?2 WHERE id = ?1",
            params![user_id, status.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Delete a user and, by cascade, everything they own.
    pub fn delete(conn: &Connection, user_id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
        let status: String = row.get(3)?;
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            status: UserStatus::from_column(&status),
            created_at: row.get(4)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
