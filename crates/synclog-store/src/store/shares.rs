//! Share management for session owners.

use std::collections::BTreeMap;

use synclog_core::SessionId;
use synclog_core::time::format_timestamp;
use tracing::{debug, instrument};

use crate::errors::{Result, StoreError};
use crate::sqlite::connection::{ConnectionPool, PooledConnection};
use crate::sqlite::repositories::session::SessionRepo;
use crate::sqlite::repositories::share::ShareRepo;
use crate::sqlite::repositories::user::UserRepo;
use crate::sqlite::row_types::ShareRow;

use super::begin_immediate;
use super::types::{CreateShareParams, SessionShare};

/// Creates, lists, and revokes session shares.
#[derive(Clone)]
pub struct ShareStore {
    pool: ConnectionPool,
}

impl ShareStore {
    /// Create a share store over `pool`.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Share an owned session publicly or with named recipients.
    ///
    /// Recipient emails are de-duplicated ignoring case. Emails without an
    /// account are kept and matched once that account exists.
    #[instrument(skip(self, params), fields(session_id = %params.session_id, is_public = params.is_public))]
    pub fn create_share(&self, owner: i64, params: &CreateShareParams) -> Result<SessionShare> {
        let not_found = || StoreError::SessionNotFound(params.session_id.clone());
        let id = SessionId::parse(&params.session_id).ok_or_else(not_found)?;
        let conn = self.conn()?;
        let tx = begin_immediate(&conn)?;

        let (session_owner, external_id) =
            SessionRepo::owner_and_external_id(&tx, &id)?.ok_or_else(not_found)?;
        if session_owner != owner {
            return Err(not_found());
        }

        let expires_at = params.expires_at.map(format_timestamp);
        let share = ShareRepo::insert(&tx, &id, expires_at.as_deref())?;

        let mut recipients = Vec::new();
        if params.is_public {
            ShareRepo::mark_public(&tx, share.id)?;
        } else {
            let unique: BTreeMap<String, &str> = params
                .recipient_emails
                .iter()
                .map(|e| e.trim())
                .filter(|e| !e.is_empty())
                .map(|e| (e.to_lowercase(), e))
                .collect();
            let emails: Vec<&str> = unique.values().copied().collect();
            let user_ids = UserRepo::ids_by_emails(&tx, &emails)?;
            for (key, email) in &unique {
                ShareRepo::add_recipient(&tx, share.id, email, user_ids.get(key).copied())?;
            }
            recipients = ShareRepo::recipients(&tx, share.id)?;
        }

        tx.commit()?;
        debug!(share_id = share.id, recipients = recipients.len(), "share created");
        Ok(to_session_share(share, external_id, params.is_public, recipients))
    }

    /// Share a session with every signed-in user. No ownership check.
    #[instrument(skip(self, expires_at))]
    pub fn create_system_share(
        &self,
        session_id: &str,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<SessionShare> {
        let not_found = || StoreError::SessionNotFound(session_id.to_string());
        let id = SessionId::parse(session_id).ok_or_else(not_found)?;
        let conn = self.conn()?;
        let tx = begin_immediate(&conn)?;

        let (_, external_id) =
            SessionRepo::owner_and_external_id(&tx, &id)?.ok_or_else(not_found)?;
        let expires_at = expires_at.map(format_timestamp);
        let share = ShareRepo::insert(&tx, &id, expires_at.as_deref())?;
        ShareRepo::mark_system(&tx, share.id)?;
        tx.commit()?;

        debug!(share_id = share.id, "system share created");
        Ok(to_session_share(share, external_id, false, Vec::new()))
    }

    /// Shares of an owned session, newest first.
    pub fn list_shares(&self, session_id: &str, owner: i64) -> Result<Vec<SessionShare>> {
        let not_found = || StoreError::SessionNotFound(session_id.to_string());
        let id = SessionId::parse(session_id).ok_or_else(not_found)?;
        let conn = self.conn()?;

        let (session_owner, external_id) =
            SessionRepo::owner_and_external_id(&conn, &id)?.ok_or_else(not_found)?;
        if session_owner != owner {
            return Err(not_found());
        }

        ShareRepo::list_for_session(&conn, &id)?
            .into_iter()
            .map(|share| -> Result<SessionShare> {
                let is_public = ShareRepo::is_public(&conn, share.id)?;
                let recipients = ShareRepo::recipients(&conn, share.id)?;
                Ok(to_session_share(share, external_id.clone(), is_public, recipients))
            })
            .collect()
    }

    /// Revoke a share of a session owned by `owner`.
    #[instrument(skip(self))]
    pub fn revoke_share(&self, share_id: i64, owner: i64) -> Result<()> {
        let conn = self.conn()?;
        if !ShareRepo::delete_owned(&conn, share_id, owner)? {
            return Err(StoreError::Unauthorized);
        }
        debug!("share revoked");
        Ok(())
    }
}

fn to_session_share(
    share: ShareRow,
    external_id: String,
    is_public: bool,
    recipients: Vec<String>,
) -> SessionShare {
    SessionShare {
        id: share.id,
        session_id: share.session_id,
        external_id,
        is_public,
        expires_at: share.expires_at,
        created_at: share.created_at,
        last_accessed_at: share.last_accessed_at,
        recipients,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
