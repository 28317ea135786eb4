//! Session identity and sync reconciliation.
//!
//! [`SyncStore`] turns a client's `(user, external_id)` pair into a stable
//! session ID, merges the metadata each sync call carries, and tracks the
//! per-file high-water marks that let clients resume uploads.
//!
//! Concurrent first syncs of the same session race on the
//! `UNIQUE (user_id, external_id)` constraint. The loser sees a unique
//! violation, re-reads the winner's row, and merges into it, so every caller
//! gets the same ID and nothing is retried.

use std::collections::HashMap;

use rusqlite::Connection;
use serde_json::Value;
use synclog_core::SessionId;
use synclog_core::time::now_timestamp;
use tracing::{debug, instrument};

use crate::errors::{Result, StoreError, is_foreign_key_violation, is_unique_violation};
use crate::merge::{self, MetadataPatch, SessionMetadata};
use crate::sqlite::connection::{ConnectionPool, PooledConnection};
use crate::sqlite::repositories::facet::FacetRepo;
use crate::sqlite::repositories::session::{InsertSessionOptions, SessionRepo};
use crate::sqlite::repositories::sync_file::SyncFileRepo;

use super::begin_immediate;
use super::types::{FileStateUpdate, SyncFileState, SyncSession, SyncSessionParams};

/// Sync reconciler over a shared connection pool.
#[derive(Clone)]
pub struct SyncStore {
    pool: ConnectionPool,
}

impl SyncStore {
    /// Create a store over `pool`.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reconciliation
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve `(user_id, external_id)` to a session, creating it on first
    /// sight, and return its ID with the files synced so far.
    #[instrument(skip(self, params), fields(external_id = %params.external_id))]
    pub fn find_or_create(&self, user_id: i64, params: &SyncSessionParams) -> Result<SyncSession> {
        let conn = self.conn()?;
        let patch = MetadataPatch {
            cwd: params.cwd.as_deref(),
            transcript_path: params.transcript_path.as_deref(),
            hostname: params.hostname.as_deref(),
            username: params.username.as_deref(),
            git_info: params.git_info.as_ref(),
            ..Default::default()
        };

        let (session_id, created) =
            match merge_into_existing(&conn, user_id, &params.external_id, &patch)? {
                Some(id) => (id, false),
                None => insert_or_merge(&conn, user_id, &params.external_id, &patch)?,
            };

        record_facets(&conn, params.git_info.as_ref());

        let files = if created {
            HashMap::new()
        } else {
            SyncFileRepo::list_for_session(&conn, &session_id)?
                .into_iter()
                .map(|row| (row.file_name.clone(), SyncFileState::from(row)))
                .collect()
        };

        Ok(SyncSession {
            session_id,
            files,
            created,
        })
    }

    /// Record one uploaded chunk: advance the file's high-water mark and
    /// merge the chunk's metadata into the session, atomically.
    #[instrument(skip(self, update), fields(file_name = %update.file_name))]
    pub fn update_file_state(&self, session_id: &str, update: &FileStateUpdate) -> Result<()> {
        let id = SessionId::parse(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        let conn = self.conn()?;
        let tx = begin_immediate(&conn)?;

        let row = SessionRepo::get_by_id(&tx, &id)?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

        SyncFileRepo::upsert_progress(
            &tx,
            &row.id,
            &update.file_name,
            &update.file_type,
            update.last_synced_line,
        )?;

        let patch = MetadataPatch {
            git_info: update.git_info.as_ref(),
            summary: update.summary.as_deref(),
            first_user_message: update.first_user_message.as_deref(),
            last_message_at: update.last_message_at,
            ..Default::default()
        };
        let merged = merge::apply(SessionMetadata::from(&row), &patch);
        let _ = SessionRepo::write_metadata(&tx, &row.id, &merged, &now_timestamp())?;
        tx.commit()?;

        debug!(
            session_id = %row.id,
            last_synced_line = update.last_synced_line,
            "file state updated"
        );
        record_facets(&conn, update.git_info.as_ref());
        Ok(())
    }

    /// Sync state of one file.
    pub fn get_file_state(&self, session_id: &str, file_name: &str) -> Result<SyncFileState> {
        let not_found = || StoreError::FileNotFound {
            session_id: session_id.to_string(),
            file_name: file_name.to_string(),
        };
        let id = SessionId::parse(session_id).ok_or_else(not_found)?;
        let conn = self.conn()?;
        SyncFileRepo::get(&conn, &id, file_name)?
            .map(SyncFileState::from)
            .ok_or_else(not_found)
    }

    /// Overwrite a file's chunk estimate. Unknown sessions and files are
    /// ignored.
    pub fn set_chunk_count_estimate(
        &self,
        session_id: &str,
        file_name: &str,
        chunk_count: i64,
    ) -> Result<()> {
        let Some(id) = SessionId::parse(session_id) else {
            return Ok(());
        };
        let conn = self.conn()?;
        if !SyncFileRepo::set_chunk_count(&conn, &id, file_name, chunk_count)? {
            debug!(session_id, file_name, "no file row for chunk estimate");
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ownership
    // ─────────────────────────────────────────────────────────────────────

    /// Check that `user_id` owns the session and return its external ID.
    pub fn verify_session_ownership(&self, session_id: &str, user_id: i64) -> Result<String> {
        let conn = self.conn()?;
        let (owner, external_id) = owner_and_external_id(&conn, session_id)?;
        if owner != user_id {
            return Err(StoreError::Forbidden);
        }
        Ok(external_id)
    }

    /// Owner and external ID of a session.
    pub fn get_session_owner_and_external_id(&self, session_id: &str) -> Result<(i64, String)> {
        let conn = self.conn()?;
        owner_and_external_id(&conn, session_id)
    }

    /// Session ID for a user's external ID.
    pub fn get_session_id_by_external_id(&self, external_id: &str, user_id: i64) -> Result<String> {
        let conn = self.conn()?;
        SessionRepo::find_by_external_id(&conn, user_id, external_id)?
            .map(|row| row.id)
            .ok_or_else(|| StoreError::SessionNotFound(external_id.to_string()))
    }

    /// Replace the summary of a user's session. An empty summary clears it.
    pub fn update_session_summary(
        &self,
        external_id: &str,
        user_id: i64,
        summary: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        let value = (!summary.is_empty()).then_some(summary);
        if !SessionRepo::update_summary_by_external_id(&conn, user_id, external_id, value)? {
            return Err(StoreError::SessionNotFound(external_id.to_string()));
        }
        Ok(())
    }

    /// Set or clear the owner-chosen title.
    pub fn update_session_custom_title(
        &self,
        session_id: &str,
        user_id: i64,
        title: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let tx = begin_immediate(&conn)?;
        let id = owned_session_id(&tx, session_id, user_id)?;
        if !SessionRepo::update_custom_title(&tx, &id, title)? {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        tx.commit()?;
        Ok(())
    }

    /// Store a generated title suggestion. An empty suggestion is ignored.
    pub fn update_session_suggested_title(&self, session_id: &str, title: &str) -> Result<()> {
        if title.is_empty() {
            return Ok(());
        }
        let not_found = || StoreError::SessionNotFound(session_id.to_string());
        let id = SessionId::parse(session_id).ok_or_else(not_found)?;
        let conn = self.conn()?;
        if !SessionRepo::update_suggested_title(&conn, &id, title)? {
            return Err(not_found());
        }
        Ok(())
    }

    /// Delete a session with its files and shares.
    #[instrument(skip(self))]
    pub fn delete_session(&self, session_id: &str, user_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let tx = begin_immediate(&conn)?;
        let id = owned_session_id(&tx, session_id, user_id)?;
        if !SessionRepo::delete(&tx, &id)? {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        tx.commit()?;
        debug!(session_id = %id, "session deleted");
        Ok(())
    }

    /// Known repository and branch facets.
    pub fn list_facets(&self) -> Result<(Vec<String>, Vec<String>)> {
        let conn = self.conn()?;
        Ok((FacetRepo::list_repos(&conn)?, FacetRepo::list_branches(&conn)?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal
// ─────────────────────────────────────────────────────────────────────────────

/// Merge `patch` into the user's session under a write lock. `None` if the
/// session does not exist.
fn merge_into_existing(
    conn: &Connection,
    user_id: i64,
    external_id: &str,
    patch: &MetadataPatch<'_>,
) -> Result<Option<String>> {
    let tx = begin_immediate(conn)?;
    let Some(row) = SessionRepo::find_by_external_id(&tx, user_id, external_id)? else {
        return Ok(None);
    };
    let merged = merge::apply(SessionMetadata::from(&row), patch);
    let _ = SessionRepo::write_metadata(&tx, &row.id, &merged, &now_timestamp())?;
    tx.commit()?;
    Ok(Some(row.id))
}

/// Insert a new session, or merge into the one a concurrent caller inserted
/// first. Returns the session ID and whether this call created it.
fn insert_or_merge(
    conn: &Connection,
    user_id: i64,
    external_id: &str,
    patch: &MetadataPatch<'_>,
) -> Result<(String, bool)> {
    let metadata = merge::apply(SessionMetadata::default(), patch);
    let inserted = SessionRepo::insert(
        conn,
        &InsertSessionOptions {
            user_id,
            external_id,
            metadata: &metadata,
        },
    );
    match inserted {
        Ok(row) => {
            debug!(session_id = %row.id, "session created");
            Ok((row.id, true))
        }
        Err(StoreError::Sqlite(e)) if is_unique_violation(&e) => {
            debug!("concurrent create won; merging into existing session");
            let id = merge_into_existing(conn, user_id, external_id, patch)?.ok_or_else(|| {
                StoreError::Internal(format!(
                    "session {external_id} missing after uniqueness conflict"
                ))
            })?;
            Ok((id, false))
        }
        Err(StoreError::Sqlite(e)) if is_foreign_key_violation(&e) => {
            Err(StoreError::UserNotFound(user_id))
        }
        Err(e) => Err(e),
    }
}

fn owner_and_external_id(conn: &Connection, session_id: &str) -> Result<(i64, String)> {
    let not_found = || StoreError::SessionNotFound(session_id.to_string());
    let id = SessionId::parse(session_id).ok_or_else(not_found)?;
    SessionRepo::owner_and_external_id(conn, &id)?.ok_or_else(not_found)
}

/// Canonical ID of a session owned by `user_id`.
fn owned_session_id(conn: &Connection, session_id: &str, user_id: i64) -> Result<SessionId> {
    let not_found = || StoreError::SessionNotFound(session_id.to_string());
    let id = SessionId::parse(session_id).ok_or_else(not_found)?;
    let (owner, _) = SessionRepo::owner_and_external_id(conn, &id)?.ok_or_else(not_found)?;
    if owner != user_id {
        return Err(StoreError::Forbidden);
    }
    Ok(id)
}

/// Best-effort facet upsert. Failures never fail the sync.
fn record_facets(conn: &Connection, git_info: Option<&Value>) {
    let Some(git_info) = git_info.filter(|v| !v.is_null()) else {
        return;
    };
    if let Err(e) = FacetRepo::upsert_from_git_info(conn, &git_info.to_string()) {
        debug!(error = %e, "facet upsert skipped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
