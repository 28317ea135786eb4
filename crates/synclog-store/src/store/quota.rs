//! Monthly Smart Recap quota ledger.
//!
//! One counter per user. The counter is reset lazily: callers invoke
//! [`QuotaLedger::reset_if_needed`] before reading it, and the reset happens
//! when the last activity falls in an earlier calendar month (UTC).

use chrono::{DateTime, Datelike, Utc};
use synclog_core::time::{format_timestamp, now_timestamp, parse_timestamp};
use tracing::{debug, instrument};

use crate::errors::{Result, StoreError, is_foreign_key_violation};
use crate::sqlite::connection::{ConnectionPool, PooledConnection};
use crate::sqlite::repositories::quota::QuotaRepo;
use crate::sqlite::row_types::QuotaRow;

use super::begin_immediate;

/// Whether `row` belongs to a month before `now`.
///
/// The window starts at the last reset, or at the last computation if the
/// counter was never reset. A record with neither is never reset.
pub fn needs_reset(row: &QuotaRow, now: DateTime<Utc>) -> bool {
    let anchor = row
        .quota_reset_at
        .as_deref()
        .or(row.last_compute_at.as_deref())
        .and_then(parse_timestamp);
    anchor.is_some_and(|at| (at.year(), at.month()) < (now.year(), now.month()))
}

/// Per-user quota counters over a shared connection pool.
#[derive(Clone)]
pub struct QuotaLedger {
    pool: ConnectionPool,
}

impl QuotaLedger {
    /// Create a ledger over `pool`.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Fetch the user's record, creating an empty one on first use.
    pub fn get_or_create(&self, user_id: i64) -> Result<QuotaRow> {
        let conn = self.conn()?;
        ensure_record(&conn, user_id)?;
        QuotaRepo::get(&conn, user_id)?.ok_or(StoreError::QuotaNotFound(user_id))
    }

    /// Count one computation now.
    pub fn increment(&self, user_id: i64) -> Result<()> {
        let conn = self.conn()?;
        if !QuotaRepo::increment(&conn, user_id, &now_timestamp())? {
            return Err(StoreError::QuotaNotFound(user_id));
        }
        Ok(())
    }

    /// Reset the counter if the current window belongs to an earlier month.
    /// Returns whether a reset happened.
    pub fn reset_if_needed(&self, user_id: i64) -> Result<bool> {
        self.reset_if_needed_at(user_id, Utc::now())
    }

    /// [`reset_if_needed`](Self::reset_if_needed) with an explicit clock.
    #[instrument(skip(self, now))]
    pub fn reset_if_needed_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn()?;
        let tx = begin_immediate(&conn)?;
        ensure_record(&tx, user_id)?;
        let row = QuotaRepo::get(&tx, user_id)?.ok_or(StoreError::QuotaNotFound(user_id))?;

        if !needs_reset(&row, now) {
            tx.commit()?;
            return Ok(false);
        }

        let _ = QuotaRepo::reset(&tx, user_id, &format_timestamp(now))?;
        tx.commit()?;
        debug!(previous_count = row.compute_count, "quota window reset");
        Ok(true)
    }
}

fn ensure_record(conn: &rusqlite::Connection, user_id: i64) -> Result<()> {
    match QuotaRepo::ensure(conn, user_id) {
        Ok(_) => Ok(()),
        Err(StoreError::Sqlite(e)) if is_foreign_key_violation(&e) => {
            Err(StoreError::UserNotFound(user_id))
        }
        Err(e) => Err(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::connection::{ConnectionConfig, open_and_migrate};
    use crate::sqlite::repositories::user::{CreateUserOptions, UserRepo};
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use std::path::Path;

    fn setup() -> (QuotaLedger, i64) {
        let pool = open_and_migrate(Path::new(":memory:"), &ConnectionConfig::default()).unwrap();
        let user = UserRepo::create(
            &pool.get().unwrap(),
            &CreateUserOptions {
                email: "q@example.com",
                name: None,
            },
        )
        .unwrap();
        (QuotaLedger::new(pool), user.id)
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn row(last_compute_at: Option<DateTime<Utc>>, quota_reset_at: Option<DateTime<Utc>>) -> QuotaRow {
        QuotaRow {
            user_id: 1,
            compute_count: 3,
            last_compute_at: last_compute_at.map(format_timestamp),
            quota_reset_at: quota_reset_at.map(format_timestamp),
        }
    }

    // ── needs_reset ─────────────────────────────────────────────────

    #[test]
    fn no_anchor_never_resets() {
        assert!(!needs_reset(&row(None, None), at(2030, 1, 1)));
    }

    #[test]
    fn same_month_does_not_reset() {
        assert!(!needs_reset(&row(Some(at(2026, 3, 1)), None), at(2026, 3, 31)));
    }

    #[test]
    fn earlier_month_resets() {
        assert!(needs_reset(&row(Some(at(2026, 3, 31)), None), at(2026, 4, 1)));
        assert!(needs_reset(&row(Some(at(2025, 12, 15)), None), at(2026, 1, 2)));
    }

    #[test]
    fn reset_stamp_takes_precedence() {
        let r = row(Some(at(2026, 1, 10)), Some(at(2026, 2, 1)));
        assert!(!needs_reset(&r, at(2026, 2, 20)));
        assert!(needs_reset(&r, at(2026, 3, 1)));
    }

    #[test]
    fn same_month_number_in_other_year_resets() {
        assert!(needs_reset(&row(Some(at(2025, 3, 10)), None), at(2026, 3, 10)));
    }

    // ── QuotaLedger ─────────────────────────────────────────────────

    #[test]
    fn get_or_create_is_stable() {
        let (ledger, uid) = setup();
        let first = ledger.get_or_create(uid).unwrap();
        assert_eq!(first.compute_count, 0);
        ledger.increment(uid).unwrap();
        let again = ledger.get_or_create(uid).unwrap();
        assert_eq!(again.compute_count, 1);
        assert!(again.last_compute_at.is_some());
    }

    #[test]
    fn get_or_create_unknown_user() {
        let (ledger, _) = setup();
        assert_matches!(ledger.get_or_create(4242), Err(StoreError::UserNotFound(4242)));
    }

    #[test]
    fn increment_requires_record() {
        let (ledger, uid) = setup();
        assert_matches!(ledger.increment(uid), Err(StoreError::QuotaNotFound(id)) if id == uid);
    }

    #[test]
    fn reset_if_needed_is_idempotent_within_month() {
        let (ledger, uid) = setup();
        ledger.get_or_create(uid).unwrap();
        ledger.increment(uid).unwrap();
        ledger.increment(uid).unwrap();

        let next_month = Utc::now() + chrono::Duration::days(40);
        assert!(ledger.reset_if_needed_at(uid, next_month).unwrap());
        assert!(!ledger.reset_if_needed_at(uid, next_month).unwrap());

        let record = ledger.get_or_create(uid).unwrap();
        assert_eq!(record.compute_count, 0);
        assert_eq!(record.quota_reset_at, Some(format_timestamp(next_month)));
    }

    #[test]
    fn fresh_record_is_not_reset() {
        let (ledger, uid) = setup();
        assert!(!ledger.reset_if_needed(uid).unwrap());
        assert_eq!(ledger.get_or_create(uid).unwrap().compute_count, 0);
    }
}
