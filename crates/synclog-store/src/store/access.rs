//! Session access resolution.
//!
//! A viewer's access to a session is decided in a fixed order: owner, named
//! recipient, system-wide share (signed-in viewers only), public link. Only
//! unexpired shares count. The decision itself is the pure
//! [`evaluate_access`]; [`AccessResolver`] gathers its inputs.

use chrono::{DateTime, Utc};
use synclog_core::SessionId;
use synclog_core::time::format_timestamp;
use tracing::{debug, instrument, warn};

use crate::errors::{Result, StoreError};
use crate::sqlite::connection::{ConnectionPool, PooledConnection};
use crate::sqlite::repositories::session::SessionRepo;
use crate::sqlite::repositories::share::{ActiveShare, ShareRepo};
use crate::sqlite::repositories::sync_file::SyncFileRepo;
use crate::sqlite::row_types::UserStatus;

use super::types::{AccessGrant, SessionDetail, SyncFileDetail};

/// Decide a viewer's grant from the session's unexpired shares.
pub fn evaluate_access(is_owner: bool, viewer: Option<i64>, shares: &[ActiveShare]) -> AccessGrant {
    if is_owner {
        return AccessGrant::Owner;
    }

    if viewer.is_some() {
        if let Some(share) = shares.iter().find(|s| s.for_viewer) {
            return AccessGrant::Recipient {
                share_id: share.share_id,
            };
        }
        if let Some(share) = shares.iter().find(|s| s.is_system) {
            return AccessGrant::System {
                share_id: share.share_id,
            };
        }
    }

    if let Some(share) = shares.iter().find(|s| s.is_public) {
        return AccessGrant::Public {
            share_id: share.share_id,
        };
    }

    AccessGrant::None {
        auth_may_help: viewer.is_none() && !shares.is_empty(),
    }
}

/// Resolves viewer access and loads the session as that viewer may see it.
#[derive(Clone)]
pub struct AccessResolver {
    pool: ConnectionPool,
}

impl AccessResolver {
    /// Create a resolver over `pool`.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Decide how `viewer` (`None` when signed out) may access a session.
    pub fn resolve(&self, session_id: &str, viewer: Option<i64>) -> Result<AccessGrant> {
        self.resolve_at(session_id, viewer, Utc::now())
    }

    /// [`resolve`](Self::resolve) with an explicit clock for share expiry.
    #[instrument(skip(self, now))]
    pub fn resolve_at(
        &self,
        session_id: &str,
        viewer: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant> {
        let not_found = || StoreError::SessionNotFound(session_id.to_string());
        let id = SessionId::parse(session_id).ok_or_else(not_found)?;
        let conn = self.conn()?;

        let owner = SessionRepo::owner_of(&conn, &id)?.ok_or_else(not_found)?;
        if viewer == Some(owner) {
            return Ok(AccessGrant::Owner);
        }

        let shares = ShareRepo::active_for_session(&conn, &id, viewer, &format_timestamp(now))?;
        let grant = evaluate_access(false, viewer, &shares);
        debug!(grant = grant.as_str(), shares = shares.len(), "access resolved");
        Ok(grant)
    }

    /// Load a session for a viewer already holding `grant`.
    ///
    /// A deactivated owner hides the session from everyone, whatever the
    /// grant. Otherwise the grant is trusted, except that an `Owner` grant
    /// must match the viewer. Device details are returned to the owner only.
    #[instrument(skip(self, grant), fields(grant = grant.as_str()))]
    pub fn load_detail_for_viewer(
        &self,
        session_id: &str,
        viewer: Option<i64>,
        grant: &AccessGrant,
    ) -> Result<SessionDetail> {
        let not_found = || StoreError::SessionNotFound(session_id.to_string());
        let id = SessionId::parse(session_id).ok_or_else(not_found)?;
        let conn = self.conn()?;

        let joined = SessionRepo::get_with_owner(&conn, &id)?.ok_or_else(not_found)?;
        if joined.owner_status != UserStatus::Active {
            return Err(StoreError::OwnerInactive);
        }
        let is_owner = grant.is_owner();
        if !grant.allows_read() || (is_owner && viewer != Some(joined.session.user_id)) {
            return Err(StoreError::Forbidden);
        }

        let files = SyncFileRepo::list_for_detail(&conn, &id)?
            .into_iter()
            .map(SyncFileDetail::from)
            .collect();

        if let Some(share_id) = grant.share_id() {
            if let Err(e) = ShareRepo::touch_last_accessed(&conn, share_id) {
                warn!(share_id, error = %e, "failed to record share access");
            }
        }

        let session = joined.session;
        let git_info = session.git_info.as_deref().and_then(|raw| {
            serde_json::from_str(raw)
                .inspect_err(|e| warn!(session_id = %session.id, error = %e, "unreadable git_info"))
                .ok()
        });
        let (hostname, username) = if is_owner {
            (session.hostname, session.username)
        } else {
            (None, None)
        };

        Ok(SessionDetail {
            id: session.id,
            external_id: session.external_id,
            custom_title: session.custom_title,
            suggested_session_title: session.suggested_session_title,
            summary: session.summary,
            first_user_message: session.first_user_message,
            first_seen: session.first_seen,
            cwd: session.cwd,
            transcript_path: session.transcript_path,
            git_info,
            last_sync_at: session.last_sync_at,
            last_message_at: session.last_message_at,
            files,
            hostname,
            username,
            is_owner,
            shared_by_email: (!is_owner).then_some(joined.owner_email),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
