//! Session listing: the viewer's own and shared sessions, one page at a time.
//!
//! Pages are keyed on `(COALESCE(last_message_at, first_seen), id)` so that
//! sessions synced between requests never shift a later page. The cursor is
//! that pair, base64-encoded; a cursor that does not decode is ignored and the
//! first page is returned.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use synclog_core::text::build_fts_match;
use synclog_core::time::{format_timestamp, parse_timestamp};
use synclog_settings::AccessSettings;
use tracing::{debug, instrument};

use crate::errors::Result;
use crate::sqlite::connection::{ConnectionPool, PooledConnection};
use crate::sqlite::repositories::facet::{FacetRepo, extract_repo_name};
use crate::sqlite::repositories::session_list::{
    ListQuery, RANK_OWNER, RANK_RECIPIENT, SessionListRepo, SessionListRow,
};

use super::types::{
    SessionAccessType, SessionFilterOptions, SessionListItem, SessionListParams, SessionListResult,
};

/// Page size used when the caller asks for 0.
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Largest page a caller may ask for.
pub const MAX_PAGE_SIZE: usize = 200;

/// Lists sessions visible to a signed-in viewer.
#[derive(Clone)]
pub struct SessionLister {
    pool: ConnectionPool,
    share_all_sessions: bool,
}

impl SessionLister {
    /// Create a lister with share-all-sessions off.
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            share_all_sessions: false,
        }
    }

    /// Create a lister configured from settings.
    pub fn from_settings(pool: ConnectionPool, settings: &AccessSettings) -> Self {
        Self::new(pool).with_share_all_sessions(settings.share_all_sessions)
    }

    /// List every session to every signed-in viewer, and draw filter values
    /// from the global facets.
    #[must_use]
    pub fn with_share_all_sessions(mut self, enabled: bool) -> Self {
        self.share_all_sessions = enabled;
        self
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// One page of the viewer's sessions, newest activity first.
    pub fn list_sessions(&self, viewer: i64, params: &SessionListParams) -> Result<SessionListResult> {
        self.list_sessions_at(viewer, params, Utc::now())
    }

    /// [`list_sessions`](Self::list_sessions) with an explicit clock for share
    /// expiry.
    #[instrument(skip(self, params, now), fields(share_all = self.share_all_sessions))]
    pub fn list_sessions_at(
        &self,
        viewer: i64,
        params: &SessionListParams,
        now: DateTime<Utc>,
    ) -> Result<SessionListResult> {
        let page_size = effective_page_size(params.page_size);
        let now = format_timestamp(now);
        let search = params.query.as_deref().and_then(build_fts_match);
        let owners: Vec<String> = params.owners.iter().map(|o| o.trim().to_lowercase()).collect();
        let after = params.cursor.as_deref().and_then(|raw| {
            let decoded = decode_cursor(raw);
            if decoded.is_none() {
                debug!(cursor = raw, "ignoring unreadable cursor");
            }
            decoded
        });

        let conn = self.conn()?;
        let filter_options = if self.share_all_sessions {
            SessionFilterOptions {
                repos: FacetRepo::list_repos(&conn)?,
                branches: FacetRepo::list_branches(&conn)?,
                owners: SessionListRepo::all_owner_emails(&conn)?,
            }
        } else {
            let values =
                SessionListRepo::filter_values_for_viewer(&conn, viewer, &now, false)?;
            SessionFilterOptions {
                repos: values.repos,
                branches: values.branches,
                owners: values.owners,
            }
        };

        let mut rows = SessionListRepo::list(
            &conn,
            &ListQuery {
                viewer,
                now: &now,
                share_all: self.share_all_sessions,
                search: search.as_deref(),
                repos: &params.repos,
                branches: &params.branches,
                owners: &owners,
                after: after.as_ref().map(|(key, id)| (key.as_str(), id.as_str())),
                limit: i64::try_from(page_size).unwrap_or(i64::MAX).saturating_add(1),
            },
        )?;

        let has_more = rows.len() > page_size;
        rows.truncate(page_size);
        let next_cursor = has_more
            .then(|| rows.last().map(|row| encode_cursor(&row.sort_key, &row.id)))
            .flatten();

        debug!(count = rows.len(), has_more, "sessions listed");
        Ok(SessionListResult {
            sessions: rows.into_iter().map(SessionListItem::from).collect(),
            has_more,
            next_cursor,
            page_size,
            filter_options,
        })
    }
}

impl From<SessionListRow> for SessionListItem {
    fn from(row: SessionListRow) -> Self {
        let access_type = match row.access_rank {
            RANK_OWNER => SessionAccessType::Owner,
            RANK_RECIPIENT => SessionAccessType::PrivateShare,
            _ => SessionAccessType::SystemShare,
        };
        let is_owner = access_type == SessionAccessType::Owner;
        let git_repo_url = row.git_repo_url.filter(|url| !url.is_empty());
        let (hostname, username) = if is_owner {
            (row.hostname, row.username)
        } else {
            (None, None)
        };
        Self {
            id: row.id,
            external_id: row.external_id,
            first_seen: row.first_seen,
            last_sync_at: row.last_sync_at,
            last_message_at: row.last_message_at,
            custom_title: row.custom_title,
            suggested_session_title: row.suggested_session_title,
            summary: row.summary,
            first_user_message: row.first_user_message,
            file_count: row.file_count,
            total_lines: row.total_lines,
            git_repo: git_repo_url.as_deref().and_then(extract_repo_name),
            git_repo_url,
            git_branch: row.git_branch,
            is_owner,
            access_type,
            shared_by_email: (!is_owner).then(|| row.owner_email.clone()),
            owner_email: row.owner_email,
            hostname,
            username,
        }
    }
}

fn effective_page_size(requested: usize) -> usize {
    match requested {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    }
}

fn encode_cursor(sort_key: &str, id: &str) -> String {
    URL_SAFE_NO_PAD.encode(format!("{sort_key}|{id}"))
}

fn decode_cursor(cursor: &str) -> Option<(String, String)> {
    let raw = URL_SAFE_NO_PAD.decode(cursor).ok()?;
    let raw = String::from_utf8(raw).ok()?;
    let (sort_key, id) = raw.split_once('|')?;
    if id.is_empty() || parse_timestamp(sort_key).is_none() {
        return None;
    }
    Some((sort_key.to_string(), id.to_string()))
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
    use crate::store::types::{CreateShareParams, FileStateUpdate, SyncSessionParams};
    use crate::store::{ShareStore, SyncStore};
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::path::Path;

    struct Fixture {
        pool: ConnectionPool,
        sync: SyncStore,
        owner: i64,
        viewer: i64,
    }

    fn setup() -> Fixture {
        let pool = open_and_migrate(Path::new(":memory:"), &ConnectionConfig::default()).unwrap();
        let (owner, viewer) = {
            let conn = pool.get().unwrap();
            let mk = |email| UserRepo::create(&conn, &CreateUserOptions { email, name: None }).unwrap().id;
            (mk("Owner@Example.com"), mk("viewer@example.com"))
        };
        Fixture {
            sync: SyncStore::new(pool.clone()),
            pool,
            owner,
            viewer,
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 10, minute, 0).unwrap()
    }

    /// Sync a session with one transcript chunk.
    fn synced(f: &Fixture, user: i64, ext: &str, minute: u32, summary: &str, git_info: Option<serde_json::Value>) -> String {
        let session = f
            .sync
            .find_or_create(
                user,
                &SyncSessionParams {
                    external_id: ext.into(),
                    hostname: Some("laptop".into()),
                    git_info,
                    ..Default::default()
                },
            )
            .unwrap();
        f.sync
            .update_file_state(
                &session.session_id,
                &FileStateUpdate {
                    file_name: "main.jsonl".into(),
                    file_type: "transcript".into(),
                    last_synced_line: 12,
                    last_message_at: Some(at(minute)),
                    summary: Some(summary.into()),
                    ..Default::default()
                },
            )
            .unwrap();
        session.session_id
    }

    fn ids(result: &SessionListResult) -> Vec<&str> {
        result.sessions.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn page_size_defaults_and_caps() {
        assert_eq!(effective_page_size(0), DEFAULT_PAGE_SIZE);
        assert_eq!(effective_page_size(7), 7);
        assert_eq!(effective_page_size(10_000), MAX_PAGE_SIZE);
    }

    #[test]
    fn cursor_decodes_only_what_it_encoded() {
        let key = "2026-02-01T10:00:00.000000Z";
        let cursor = encode_cursor(key, "abc");
        assert_eq!(decode_cursor(&cursor), Some((key.to_string(), "abc".to_string())));
        assert_eq!(decode_cursor("not base64 !"), None);
        assert_eq!(decode_cursor(&URL_SAFE_NO_PAD.encode("no-separator")), None);
        assert_eq!(decode_cursor(&URL_SAFE_NO_PAD.encode("yesterday|abc")), None);
        assert_eq!(decode_cursor(&URL_SAFE_NO_PAD.encode(format!("{key}|"))), None);
    }

    #[test]
    fn owner_listing_includes_device_fields() {
        let f = setup();
        let id = synced(
            &f,
            f.owner,
            "a",
            1,
            "refactor auth",
            Some(json!({"repo_url": "https://github.com/org/api.git", "branch": "main"})),
        );
        let lister = SessionLister::new(f.pool.clone());
        let page = lister.list_sessions(f.owner, &SessionListParams::default()).unwrap();

        assert_eq!(ids(&page), vec![id.as_str()]);
        let item = &page.sessions[0];
        assert!(item.is_owner);
        assert_eq!(item.access_type, SessionAccessType::Owner);
        assert_eq!(item.hostname.as_deref(), Some("laptop"));
        assert!(item.shared_by_email.is_none());
        assert_eq!(item.git_repo.as_deref(), Some("org/api"));
        assert_eq!(item.git_branch.as_deref(), Some("main"));
        assert_eq!(item.total_lines, 12);
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
        assert_eq!(page.filter_options.repos, vec!["org/api"]);
        assert_eq!(page.filter_options.owners, vec!["owner@example.com"]);
    }

    #[test]
    fn shared_listing_hides_device_fields() {
        let f = setup();
        let id = synced(&f, f.owner, "a", 1, "refactor auth", None);
        ShareStore::new(f.pool.clone())
            .create_share(
                f.owner,
                &CreateShareParams {
                    session_id: id.clone(),
                    recipient_emails: vec!["viewer@example.com".into()],
                    ..Default::default()
                },
            )
            .unwrap();

        let page = SessionLister::new(f.pool.clone())
            .list_sessions(f.viewer, &SessionListParams::default())
            .unwrap();
        let item = &page.sessions[0];
        assert!(!item.is_owner);
        assert_eq!(item.access_type, SessionAccessType::PrivateShare);
        assert!(item.hostname.is_none());
        assert_eq!(item.shared_by_email.as_deref(), Some("Owner@Example.com"));
    }

    #[test]
    fn expired_share_drops_out_at_expiry() {
        let f = setup();
        let id = synced(&f, f.owner, "a", 1, "refactor auth", None);
        let expires = at(30) + Duration::days(1);
        ShareStore::new(f.pool.clone())
            .create_system_share(&id, Some(expires))
            .unwrap();
        let lister = SessionLister::new(f.pool.clone());
        let params = SessionListParams::default();

        let before = lister.list_sessions_at(f.viewer, &params, expires - Duration::seconds(1)).unwrap();
        assert_eq!(before.sessions[0].access_type, SessionAccessType::SystemShare);
        let after = lister.list_sessions_at(f.viewer, &params, expires).unwrap();
        assert!(after.sessions.is_empty());
        assert!(after.filter_options.owners.is_empty());
    }

    #[test]
    fn pages_walk_every_session_once() {
        let f = setup();
        let mut expected = Vec::new();
        for minute in 0..5 {
            expected.push(synced(&f, f.owner, &format!("s{minute}"), minute, "work", None));
        }
        expected.reverse();

        let lister = SessionLister::new(f.pool.clone());
        let mut seen = Vec::new();
        let mut params = SessionListParams {
            page_size: 2,
            ..Default::default()
        };
        loop {
            let page = lister.list_sessions(f.owner, &params).unwrap();
            seen.extend(page.sessions.iter().map(|s| s.id.clone()));
            if !page.has_more {
                assert!(page.next_cursor.is_none());
                break;
            }
            params.cursor = page.next_cursor;
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn unreadable_cursor_returns_first_page() {
        let f = setup();
        let id = synced(&f, f.owner, "a", 1, "work", None);
        let page = SessionLister::new(f.pool.clone())
            .list_sessions(
                f.owner,
                &SessionListParams {
                    cursor: Some("garbage".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(ids(&page), vec![id.as_str()]);
    }

    #[test]
    fn query_uses_prefix_search() {
        let f = setup();
        let auth = synced(&f, f.owner, "a", 1, "Refactor the authentication flow", None);
        let _billing = synced(&f, f.owner, "b", 2, "Billing cleanup", None);
        let lister = SessionLister::new(f.pool.clone());
        let search = |q: &str| {
            lister
                .list_sessions(
                    f.owner,
                    &SessionListParams {
                        query: Some(q.into()),
                        ..Default::default()
                    },
                )
                .unwrap()
        };

        assert_eq!(ids(&search("auth")), vec![auth.as_str()]);
        assert_eq!(ids(&search("AUTH flo")), vec![auth.as_str()]);
        assert!(search("auth billing").sessions.is_empty());
        assert_eq!(search("&|()").sessions.len(), 2);
    }

    #[test]
    fn custom_title_is_searchable() {
        let f = setup();
        let id = synced(&f, f.owner, "a", 1, "work", None);
        f.sync
            .update_session_custom_title(&id, f.owner, Some("Payments outage"))
            .unwrap();
        let page = SessionLister::new(f.pool.clone())
            .list_sessions(
                f.owner,
                &SessionListParams {
                    query: Some("outage".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(ids(&page), vec![id.as_str()]);
    }

    #[test]
    fn owner_filter_is_case_insensitive() {
        let f = setup();
        let mine = synced(&f, f.owner, "a", 1, "work", None);
        let theirs = synced(&f, f.viewer, "b", 2, "work", None);
        let lister = SessionLister::new(f.pool.clone()).with_share_all_sessions(true);

        let page = lister
            .list_sessions(
                f.viewer,
                &SessionListParams {
                    owners: vec![" OWNER@example.COM ".into()],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(ids(&page), vec![mine.as_str()]);

        let page = lister.list_sessions(f.viewer, &SessionListParams::default()).unwrap();
        assert_eq!(ids(&page), vec![theirs.as_str(), mine.as_str()]);
    }

    #[test]
    fn share_all_reads_global_facets() {
        let f = setup();
        synced(
            &f,
            f.owner,
            "a",
            1,
            "work",
            Some(json!({"repo_url": "git@github.com:org/web.git", "branch": "dev"})),
        );
        let settings = AccessSettings {
            share_all_sessions: true,
        };
        let page = SessionLister::from_settings(f.pool.clone(), &settings)
            .list_sessions(f.viewer, &SessionListParams::default())
            .unwrap();
        assert_eq!(page.sessions[0].access_type, SessionAccessType::SystemShare);
        assert_eq!(
            page.filter_options,
            SessionFilterOptions {
                repos: vec!["org/web".into()],
                branches: vec!["dev".into()],
                owners: vec!["owner@example.com".into(), "viewer@example.com".into()],
            }
        );
    }
}
