//! Quota repository: per-user Smart Recap usage counters.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::QuotaRow;

/// Quota repository: stateless, every method takes `&Connection`.
pub struct QuotaRepo;

impl QuotaRepo {
    /// Create an empty record for `user_id` unless one exists.
    ///
    /// Returns `true` if a row was inserted.
    pub fn ensure(conn: &Connection, user_id: i64) -> Result<bool> {
        let inserted = conn.execute(
            "INSERT INTO smart_recap_quota (user_id, compute_count) VALUES (?1, 0)
             ON CONFLICT (user_id) DO NOTHING",
            params![user_id],
        )?;
        Ok(inserted > 0)
    }

    /// Get a user's record.
    pub fn get(conn: &Connection, user_id: i64) -> Result<Option<QuotaRow>> {
        let row = conn
            .query_row(
                "SELECT user_id, compute_count, last_compute_at, quota_reset_at
                 FROM smart_recap_quota WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(QuotaRow {
                        user_id: row.get(0)?,
                        compute_count: row.get(1)?,
                        last_compute_at: row.get(2)?,
                        quota_reset_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Count one computation at `at`. Returns `false` if there is no record.
    pub fn increment(conn: &Connection, user_id: i64, at: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE smart_recap_quota
             SET compute_count = compute_count + 1, last_compute_at = ?2
             WHERE user_id = ?1",
            params![user_id, at],
        )?;
        Ok(changed > 0)
    }

    /// Zero the counter and stamp the reset time.
    pub fn reset(conn: &Connection, user_id: i64, at: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE smart_recap_quota SET compute_count = 0, quota_reset_at = ?2 WHERE user_id = ?1",
            params![user_id, at],
        )?;
        Ok(changed > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
