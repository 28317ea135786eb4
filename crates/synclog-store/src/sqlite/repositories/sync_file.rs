//! Sync file repository: per-file high-water marks within a session.

use rusqlite::{Connection, OptionalExtension, params};
use synclog_core::time::now_timestamp;

use crate::errors::Result;
use crate::sqlite::row_types::SyncFileRow;

/// File type excluded from session detail views.
pub const TODO_FILE_TYPE: &str = "todo";

/// Sync file repository: stateless, every method takes `&Connection`.
pub struct SyncFileRepo;

impl SyncFileRepo {
    /// Record that `file_name` has been synced through `last_synced_line`.
    ///
    /// First write inserts with a chunk estimate of 1. Later writes replace
    /// the high-water mark and bump the estimate; `file_type` keeps its
    /// first value.
    pub fn upsert_progress(
        conn: &Connection,
        session_id: &str,
        file_name: &str,
        file_type: &str,
        last_synced_line: i64,
    ) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO sync_files (session_id, file_name, file_type, last_synced_line, chunk_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)
             ON CONFLICT (session_id, file_name) DO UPDATE SET
                last_synced_line = excluded.last_synced_line,
                chunk_count = COALESCE(sync_files.chunk_count, 0) + 1,
                updated_at = excluded.updated_at",
            params![session_id, file_name, file_type, last_synced_line, now_timestamp()],
        )?;
        Ok(())
    }

    /// Get one file's sync state.
    pub fn get(conn: &Connection, session_id: &str, file_name: &str) -> Result<Option<SyncFileRow>> {
        let row = conn
            .query_row(
                "SELECT session_id, file_name, file_type, last_synced_line, chunk_count, updated_at
                 FROM sync_files WHERE session_id = ?1 AND file_name = ?2",
                params![session_id, file_name],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All files tracked for a session, by name.
    pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<SyncFileRow>> {
        let mut stmt = conn.prepare(
            "SELECT session_id, file_name, file_type, last_synced_line, chunk_count, updated_at
             FROM sync_files WHERE session_id = ?1 ORDER BY file_name ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Files shown in a session detail view: `todo` files are omitted, the
    /// rest ordered by type descending then name ascending.
    pub fn list_for_detail(conn: &Connection, session_id: &str) -> Result<Vec<SyncFileRow>> {
        let mut stmt = conn.prepare(
            "SELECT session_id, file_name, file_type, last_synced_line, chunk_count, updated_at
             FROM sync_files
             WHERE session_id = ?1 AND file_type != ?2
             ORDER BY file_type DESC, file_name ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id, TODO_FILE_TYPE], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Overwrite the chunk estimate. Returns `false` if no such file row.
    pub fn set_chunk_count(
        conn: &Connection,
        session_id: &str,
        file_name: &str,
        chunk_count: i64,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sync_files SET chunk_count = ?3 WHERE session_id = ?1 AND file_name = ?2",
            params![session_id, file_name, chunk_count],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncFileRow> {
        Ok(SyncFileRow {
            session_id: row.get(0)?,
            file_name: row.get(1)?,
            file_type: row.get(2)?,
            last_synced_line: row.get(3)?,
            chunk_count: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, email, created_at) VALUES (1, 'a@x.io', 'now');
             INSERT INTO sessions (id, user_id, external_id, first_seen) VALUES ('s1', 1, 'ext', 'now');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn first_upsert_inserts_with_one_chunk() {
        let conn = setup();
        SyncFileRepo::upsert_progress(&conn, "s1", "main.jsonl", "transcript", 10).unwrap();
        let row = SyncFileRepo::get(&conn, "s1", "main.jsonl").unwrap().unwrap();
        assert_eq!(row.last_synced_line, 10);
        assert_eq!(row.chunk_count, Some(1));
        assert_eq!(row.file_type, "transcript");
    }

    #[test]
    fn repeat_upsert_bumps_chunks_and_keeps_type() {
        let conn = setup();
        SyncFileRepo::upsert_progress(&conn, "s1", "f", "transcript", 10).unwrap();
        SyncFileRepo::upsert_progress(&conn, "s1", "f", "agent", 25).unwrap();
        let row = SyncFileRepo::get(&conn, "s1", "f").unwrap().unwrap();
        assert_eq!(row.last_synced_line, 25);
        assert_eq!(row.chunk_count, Some(2));
        assert_eq!(row.file_type, "transcript");
    }

    #[test]
    fn upsert_counts_from_null_estimate() {
        let conn = setup();
        conn.execute(
            "INSERT INTO sync_files (session_id, file_name, file_type, last_synced_line, updated_at)
             VALUES ('s1', 'f', 'transcript', 3, 'now')",
            [],
        )
        .unwrap();
        SyncFileRepo::upsert_progress(&conn, "s1", "f", "transcript", 4).unwrap();
        let row = SyncFileRepo::get(&conn, "s1", "f").unwrap().unwrap();
        assert_eq!(row.chunk_count, Some(1));
    }

    #[test]
    fn get_missing_returns_none() {
        let conn = setup();
        assert!(SyncFileRepo::get(&conn, "s1", "nope").unwrap().is_none());
    }

    #[test]
    fn detail_listing_omits_todo_and_orders() {
        let conn = setup();
        SyncFileRepo::upsert_progress(&conn, "s1", "b.jsonl", "agent", 1).unwrap();
        SyncFileRepo::upsert_progress(&conn, "s1", "a.jsonl", "agent", 1).unwrap();
        SyncFileRepo::upsert_progress(&conn, "s1", "main.jsonl", "transcript", 1).unwrap();
        SyncFileRepo::upsert_progress(&conn, "s1", "todos.json", "todo", 1).unwrap();

        let names: Vec<String> = SyncFileRepo::list_for_detail(&conn, "s1")
            .unwrap()
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        assert_eq!(names, vec!["main.jsonl", "a.jsonl", "b.jsonl"]);

        assert_eq!(SyncFileRepo::list_for_session(&conn, "s1").unwrap().len(), 4);
    }

    #[test]
    fn set_chunk_count_overwrites() {
        let conn = setup();
        SyncFileRepo::upsert_progress(&conn, "s1", "f", "transcript", 1).unwrap();
        assert!(SyncFileRepo::set_chunk_count(&conn, "s1", "f", 42).unwrap());
        assert_eq!(
            SyncFileRepo::get(&conn, "s1", "f").unwrap().unwrap().chunk_count,
            Some(42)
        );
        assert!(!SyncFileRepo::set_chunk_count(&conn, "s1", "ghost", 1).unwrap());
    }
}
