//! Session list repository: the sessions one viewer can see, filtered and
//! keyset-paginated, and the filter values available to that viewer.
//!
//! Visibility comes from three sources, each with a rank: owned sessions (1),
//! unexpired recipient shares naming the viewer (2), and unexpired system
//! shares (3). With share-all enabled every session is visible at rank 3. A
//! session reachable more than one way is listed once, at its lowest rank.
//!
//! Listing requires the `repo_name` SQL function, registered on every pooled
//! connection by [`register_functions`](crate::sqlite::connection::register_functions).

use std::collections::BTreeSet;
use std::fmt::Write;

use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::errors::Result;
use crate::sqlite::repositories::facet::extract_repo_name;

/// Rank of an owned session.
pub const RANK_OWNER: i64 = 1;
/// Rank of a session shared with the viewer by name.
pub const RANK_RECIPIENT: i64 = 2;
/// Rank of a session visible through a system share or share-all.
pub const RANK_SYSTEM: i64 = 3;

/// One page request. Slices are matched exactly; `owners` must be lowercase.
#[derive(Default)]
pub struct ListQuery<'a> {
    /// The signed-in viewer.
    pub viewer: i64,
    /// Current time in the persisted timestamp format, for share expiry.
    pub now: &'a str,
    /// Make every session visible.
    pub share_all: bool,
    /// FTS5 match expression over titles, summary and first message.
    pub search: Option<&'a str>,
    /// Repository names (`org/repo`).
    pub repos: &'a [String],
    /// Branch names.
    pub branches: &'a [String],
    /// Owner emails, lowercase.
    pub owners: &'a [String],
    /// Keyset position `(sort_key, id)`; only rows strictly after it.
    pub after: Option<(&'a str, &'a str)>,
    /// Maximum rows returned.
    pub limit: i64,
}

/// A visible session with its list-view projection.
#[derive(Clone, Debug)]
pub struct SessionListRow {
    /// Session ID.
    pub id: String,
    /// Client-supplied identifier.
    pub external_id: String,
    /// First sync timestamp.
    pub first_seen: String,
    /// Last sync timestamp.
    pub last_sync_at: Option<String>,
    /// Newest message timestamp.
    pub last_message_at: Option<String>,
    /// Owner-set title.
    pub custom_title: Option<String>,
    /// Generated title suggestion.
    pub suggested_session_title: Option<String>,
    /// Transcript summary.
    pub summary: Option<String>,
    /// First user message excerpt.
    pub first_user_message: Option<String>,
    /// `git_info.repo_url` when it is a string.
    pub git_repo_url: Option<String>,
    /// `git_info.branch` when it is a string.
    pub git_branch: Option<String>,
    /// Client hostname.
    pub hostname: Option<String>,
    /// Client OS username.
    pub username: Option<String>,
    /// Owner's email.
    pub owner_email: String,
    /// Lowest visibility rank ([`RANK_OWNER`], [`RANK_RECIPIENT`], [`RANK_SYSTEM`]).
    pub access_rank: i64,
    /// Number of synced files.
    pub file_count: i64,
    /// Sum of the files' high-water marks.
    pub total_lines: i64,
    /// `COALESCE(last_message_at, first_seen)`, the ordering key.
    pub sort_key: String,
}

/// Distinct filter values, sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterValues {
    /// Repository names.
    pub repos: Vec<String>,
    /// Branch names.
    pub branches: Vec<String>,
    /// Owner emails, lowercase.
    pub owners: Vec<String>,
}

/// `git_info.<field>` as text, or NULL when `git_info` is missing, not JSON,
/// or holds a non-string there.
fn git_text(field: &str) -> String {
    format!(
        "CASE WHEN json_valid(s.git_info) THEN \
           CASE json_type(s.git_info, '$.{field}') WHEN 'text' \
             THEN json_extract(s.git_info, '$.{field}') END \
         END"
    )
}

/// `visible` and `best` CTEs over `?1` (viewer) and `?2` (now).
fn visibility_ctes(share_all: bool) -> String {
    let mut sql = String::from(
        "WITH visible AS (
             SELECT id AS session_id, 1 AS rank FROM sessions WHERE user_id = ?1
             UNION ALL
             SELECT sh.session_id, 2 FROM session_shares sh
             JOIN session_share_recipients r ON r.share_id = sh.id
             WHERE (r.user_id = ?1 OR r.email = (SELECT email FROM users WHERE id = ?1))
               AND (sh.expires_at IS NULL OR sh.expires_at > ?2)
             UNION ALL
             SELECT sh.session_id, 3 FROM session_shares sh
             JOIN session_share_system y ON y.share_id = sh.id
             WHERE sh.expires_at IS NULL OR sh.expires_at > ?2",
    );
    if share_all {
        sql.push_str(
            "
             UNION ALL
             SELECT id, 3 FROM sessions",
        );
    }
    sql.push_str(
        "
         ),
         best AS (
             SELECT session_id, MIN(rank) AS rank FROM visible GROUP BY session_id
         )",
    );
    sql
}

fn push_in_list(
    sql: &mut String,
    expr: &str,
    values: &[String],
    param_values: &mut Vec<Box<dyn ToSql>>,
) {
    if values.is_empty() {
        return;
    }
    let placeholders: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, _)| format!("?{}", param_values.len() + i + 1))
        .collect();
    let _ = write!(sql, " AND {expr} IN ({})", placeholders.join(", "));
    for v in values {
        param_values.push(Box::new(v.clone()));
    }
}

/// Session list repository: stateless, every method takes `&Connection`.
pub struct SessionListRepo;

impl SessionListRepo {
    /// Visible sessions with content, newest activity first.
    ///
    /// A session has content once a file has synced lines and it has a
    /// summary or first message. Sessions of deactivated owners are listed to
    /// nobody but the owner.
    pub fn list(conn: &Connection, q: &ListQuery<'_>) -> Result<Vec<SessionListRow>> {
        let mut sql = visibility_ctes(q.share_all);
        let _ = write!(
            sql,
            ",
             file_stats AS (
                 SELECT session_id, COUNT(*) AS file_count, SUM(last_synced_line) AS total_lines
                 FROM sync_files GROUP BY session_id
             )
             SELECT s.id, s.external_id, s.first_seen, s.last_sync_at, s.last_message_at,
                    s.custom_title, s.suggested_session_title, s.summary, s.first_user_message,
                    {repo_url}, {branch}, s.hostname, s.username, u.email, b.rank,
                    COALESCE(f.file_count, 0), COALESCE(f.total_lines, 0),
                    COALESCE(s.last_message_at, s.first_seen) AS sort_key
             FROM best b
             JOIN sessions s ON s.id = b.session_id
             JOIN users u ON u.id = s.user_id
             LEFT JOIN file_stats f ON f.session_id = s.id
             WHERE COALESCE(f.total_lines, 0) > 0
               AND (s.summary IS NOT NULL OR s.first_user_message IS NOT NULL)
               AND (b.rank = 1 OR u.status = 'active')",
            repo_url = git_text("repo_url"),
            branch = git_text("branch"),
        );

        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();
        param_values.push(Box::new(q.viewer));
        param_values.push(Box::new(q.now.to_string()));

        let repo_expr = format!("repo_name({})", git_text("repo_url"));
        push_in_list(&mut sql, &repo_expr, q.repos, &mut param_values);
        push_in_list(&mut sql, &git_text("branch"), q.branches, &mut param_values);
        push_in_list(&mut sql, "lower(u.email)", q.owners, &mut param_values);

        if let Some(search) = q.search {
            let _ = write!(
                sql,
                " AND s.id IN (SELECT session_id FROM sessions_fts WHERE sessions_fts MATCH ?{})",
                param_values.len() + 1
            );
            param_values.push(Box::new(search.to_string()));
        }
        if let Some((sort_key, id)) = q.after {
            let _ = write!(
                sql,
                " AND (COALESCE(s.last_message_at, s.first_seen), s.id) < (?{}, ?{})",
                param_values.len() + 1,
                param_values.len() + 2
            );
            param_values.push(Box::new(sort_key.to_string()));
            param_values.push(Box::new(id.to_string()));
        }

        let _ = write!(
            sql,
            " ORDER BY sort_key DESC, s.id DESC LIMIT ?{}",
            param_values.len() + 1
        );
        param_values.push(Box::new(q.limit));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn ToSql> = param_values.iter().map(Box::as_ref).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Repositories, branches and owners across the viewer's visible sessions.
    pub fn filter_values_for_viewer(
        conn: &Connection,
        viewer: i64,
        now: &str,
        share_all: bool,
    ) -> Result<FilterValues> {
        let sql = format!(
            "{ctes}
             SELECT {repo_url}, {branch}, lower(u.email)
             FROM best b
             JOIN sessions s ON s.id = b.session_id
             JOIN users u ON u.id = s.user_id",
            ctes = visibility_ctes(share_all),
            repo_url = git_text("repo_url"),
            branch = git_text("branch"),
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params![viewer, now])?;

        let mut repos = BTreeSet::new();
        let mut branches = BTreeSet::new();
        let mut owners = BTreeSet::new();
        while let Some(row) = rows.next()? {
            let repo_url: Option<String> = row.get(0)?;
            if let Some(repo) = repo_url.as_deref().and_then(extract_repo_name) {
                let _ = repos.insert(repo);
            }
            if let Some(branch) = row.get::<_, Option<String>>(1)?.filter(|b| !b.is_empty()) {
                let _ = branches.insert(branch);
            }
            let _ = owners.insert(row.get::<_, String>(2)?);
        }

        Ok(FilterValues {
            repos: repos.into_iter().collect(),
            branches: branches.into_iter().collect(),
            owners: owners.into_iter().collect(),
        })
    }

    /// Every account email, lowercase and sorted.
    pub fn all_owner_emails(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached("SELECT DISTINCT lower(email) FROM users ORDER BY 1")?;
        let emails = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(emails)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<SessionListRow> {
        Ok(SessionListRow {
            id: row.get(0)?,
            external_id: row.get(1)?,
            first_seen: row.get(2)?,
            last_sync_at: row.get(3)?,
            last_message_at: row.get(4)?,
            custom_title: row.get(5)?,
            suggested_session_title: row.get(6)?,
            summary: row.get(7)?,
            first_user_message: row.get(8)?,
            git_repo_url: row.get(9)?,
            git_branch: row.get(10)?,
            hostname: row.get(11)?,
            username: row.get(12)?,
            owner_email: row.get(13)?,
            access_rank: row.get(14)?,
            file_count: row.get(15)?,
            total_lines: row.get(16)?,
            sort_key: row.get(17)?,
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
    use crate::sqlite::connection::register_functions;
    use crate::sqlite::migrations::run_migrations;
    use rusqlite::params;

    const NOW: &str = "2026-03-01T00:00:00.000000Z";

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        register_functions(&conn).unwrap();
        run_migrations(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, email, created_at) VALUES
                (1, 'Owner@Example.com', 'now'),
                (2, 'viewer@example.com', 'now'),
                (3, 'third@example.com', 'now');",
        )
        .unwrap();
        conn
    }

    /// Insert a session with content. `at` is its last message time.
    fn session(conn: &Connection, id: &str, owner: i64, at: &str, git_info: Option<&str>) {
        conn.execute(
            "INSERT INTO sessions (id, user_id, external_id, first_seen, last_message_at, summary, git_info)
             VALUES (?1, ?2, ?1, '2026-01-01T00:00:00.000000Z', ?3, 'work on ' || ?1, ?4)",
            params![id, owner, at, git_info],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO sync_files (session_id, file_name, file_type, last_synced_line, updated_at)
             VALUES (?1, 'main.jsonl', 'transcript', 10, 'now')",
            params![id],
        )
        .unwrap();
    }

    fn share(conn: &Connection, id: i64, session_id: &str, expires_at: Option<&str>) {
        conn.execute(
            "INSERT INTO session_shares (id, session_id, expires_at, created_at) VALUES (?1, ?2, ?3, 'now')",
            params![id, session_id, expires_at],
        )
        .unwrap();
    }

    fn query(viewer: i64) -> ListQuery<'static> {
        ListQuery {
            viewer,
            now: NOW,
            limit: 50,
            ..Default::default()
        }
    }

    fn ids(rows: &[SessionListRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn owner_sees_own_sessions_newest_first() {
        let conn = setup();
        session(&conn, "a", 1, "2026-02-01T00:00:00.000000Z", None);
        session(&conn, "b", 1, "2026-02-03T00:00:00.000000Z", None);
        session(&conn, "c", 2, "2026-02-02T00:00:00.000000Z", None);

        let rows = SessionListRepo::list(&conn, &query(1)).unwrap();
        assert_eq!(ids(&rows), vec!["b", "a"]);
        assert!(rows.iter().all(|r| r.access_rank == RANK_OWNER));
        assert_eq!(rows[0].file_count, 1);
        assert_eq!(rows[0].total_lines, 10);
        assert_eq!(rows[0].owner_email, "Owner@Example.com");
    }

    #[test]
    fn sessions_without_content_are_hidden() {
        let conn = setup();
        session(&conn, "a", 1, "2026-02-01T00:00:00.000000Z", None);
        conn.execute_batch(
            "INSERT INTO sessions (id, user_id, external_id, first_seen, summary)
             VALUES ('no-files', 1, 'x', 'now', 'has summary');
             INSERT INTO sessions (id, user_id, external_id, first_seen)
             VALUES ('no-text', 1, 'y', 'now');
             INSERT INTO sync_files (session_id, file_name, file_type, last_synced_line, updated_at)
             VALUES ('no-text', 'main.jsonl', 'transcript', 5, 'now');",
        )
        .unwrap();
        assert_eq!(ids(&SessionListRepo::list(&conn, &query(1)).unwrap()), vec!["a"]);
    }

    #[test]
    fn shares_rank_and_dedupe() {
        let conn = setup();
        session(&conn, "a", 1, "2026-02-01T00:00:00.000000Z", None);
        session(&conn, "b", 1, "2026-02-02T00:00:00.000000Z", None);
        share(&conn, 10, "a", None);
        conn.execute("INSERT INTO session_share_recipients (share_id, email) VALUES (10, 'VIEWER@example.com')", [])
            .unwrap();
        share(&conn, 11, "a", None);
        conn.execute("INSERT INTO session_share_system (share_id) VALUES (11)", []).unwrap();
        share(&conn, 12, "b", None);
        conn.execute("INSERT INTO session_share_system (share_id) VALUES (12)", []).unwrap();

        let rows = SessionListRepo::list(&conn, &query(2)).unwrap();
        assert_eq!(ids(&rows), vec!["b", "a"]);
        assert_eq!(rows[0].access_rank, RANK_SYSTEM);
        assert_eq!(rows[1].access_rank, RANK_RECIPIENT);
    }

    #[test]
    fn expired_and_public_shares_do_not_list() {
        let conn = setup();
        session(&conn, "a", 1, "2026-02-01T00:00:00.000000Z", None);
        session(&conn, "b", 1, "2026-02-02T00:00:00.000000Z", None);
        share(&conn, 10, "a", Some("2026-02-15T00:00:00.000000Z"));
        conn.execute("INSERT INTO session_share_system (share_id) VALUES (10)", []).unwrap();
        share(&conn, 11, "b", None);
        conn.execute("INSERT INTO session_share_public (share_id) VALUES (11)", []).unwrap();

        assert!(SessionListRepo::list(&conn, &query(2)).unwrap().is_empty());
    }

    #[test]
    fn share_all_lists_everything_once() {
        let conn = setup();
        session(&conn, "a", 1, "2026-02-01T00:00:00.000000Z", None);
        session(&conn, "b", 2, "2026-02-02T00:00:00.000000Z", None);
        let rows = SessionListRepo::list(
            &conn,
            &ListQuery {
                share_all: true,
                ..query(2)
            },
        )
        .unwrap();
        assert_eq!(ids(&rows), vec!["b", "a"]);
        assert_eq!(rows[0].access_rank, RANK_OWNER);
        assert_eq!(rows[1].access_rank, RANK_SYSTEM);
    }

    #[test]
    fn inactive_owner_hidden_from_others() {
        let conn = setup();
        session(&conn, "a", 1, "2026-02-01T00:00:00.000000Z", None);
        share(&conn, 10, "a", None);
        conn.execute("INSERT INTO session_share_system (share_id) VALUES (10)", []).unwrap();
        conn.execute("UPDATE users SET status = 'inactive' WHERE id = 1", []).unwrap();

        assert!(SessionListRepo::list(&conn, &query(2)).unwrap().is_empty());
        assert_eq!(ids(&SessionListRepo::list(&conn, &query(1)).unwrap()), vec!["a"]);
    }

    #[test]
    fn filters_by_repo_branch_and_owner() {
        let conn = setup();
        session(
            &conn,
            "a",
            1,
            "2026-02-01T00:00:00.000000Z",
            Some(r#"{"repo_url":"https://github.com/org/api.git","branch":"main"}"#),
        );
        session(
            &conn,
            "b",
            2,
            "2026-02-02T00:00:00.000000Z",
            Some(r#"{"repo_url":"git@github.com:org/web.git","branch":"dev"}"#),
        );
        session(&conn, "c", 2, "2026-02-03T00:00:00.000000Z", Some(r#"{"repo_url":7}"#));
        let all = ListQuery {
            share_all: true,
            ..query(1)
        };

        let repos = vec!["org/web".to_string()];
        let rows = SessionListRepo::list(&conn, &ListQuery { repos: &repos, ..all }).unwrap();
        assert_eq!(ids(&rows), vec!["b"]);
        assert_eq!(rows[0].git_repo_url.as_deref(), Some("git@github.com:org/web.git"));

        let branches = vec!["main".to_string(), "nope".to_string()];
        let rows = SessionListRepo::list(
            &conn,
            &ListQuery {
                branches: &branches,
                share_all: true,
                ..query(1)
            },
        )
        .unwrap();
        assert_eq!(ids(&rows), vec!["a"]);

        let owners = vec!["owner@example.com".to_string()];
        let rows = SessionListRepo::list(
            &conn,
            &ListQuery {
                owners: &owners,
                share_all: true,
                ..query(2)
            },
        )
        .unwrap();
        assert_eq!(ids(&rows), vec!["a"]);

        let rows = SessionListRepo::list(
            &conn,
            &ListQuery {
                share_all: true,
                ..query(1)
            },
        )
        .unwrap();
        assert!(rows[0].git_repo_url.is_none());
    }

    #[test]
    fn search_matches_indexed_text() {
        let conn = setup();
        session(&conn, "alpha", 1, "2026-02-01T00:00:00.000000Z", None);
        session(&conn, "beta", 1, "2026-02-02T00:00:00.000000Z", None);
        conn.execute("UPDATE sessions SET custom_title = 'Deploy pipeline' WHERE id = 'alpha'", [])
            .unwrap();

        let rows = SessionListRepo::list(
            &conn,
            &ListQuery {
                search: Some("\"deplo\"*"),
                ..query(1)
            },
        )
        .unwrap();
        assert_eq!(ids(&rows), vec!["alpha"]);
    }

    #[test]
    fn keyset_pagination_breaks_ties_on_id() {
        let conn = setup();
        let at = "2026-02-01T00:00:00.000000Z";
        for id in ["a", "b", "c"] {
            session(&conn, id, 1, at, None);
        }
        let first = SessionListRepo::list(&conn, &ListQuery { limit: 2, ..query(1) }).unwrap();
        assert_eq!(ids(&first), vec!["c", "b"]);

        let last = &first[1];
        let rest = SessionListRepo::list(
            &conn,
            &ListQuery {
                after: Some((last.sort_key.as_str(), last.id.as_str())),
                limit: 2,
                ..query(1)
            },
        )
        .unwrap();
        assert_eq!(ids(&rest), vec!["a"]);
    }

    #[test]
    fn filter_values_cover_visible_sessions_only() {
        let conn = setup();
        session(
            &conn,
            "a",
            1,
            "2026-02-01T00:00:00.000000Z",
            Some(r#"{"repo_url":"https://github.com/org/api.git","branch":"main"}"#),
        );
        session(
            &conn,
            "b",
            3,
            "2026-02-02T00:00:00.000000Z",
            Some(r#"{"repo_url":"https://github.com/org/secret","branch":"hidden"}"#),
        );
        share(&conn, 10, "a", None);
        conn.execute("INSERT INTO session_share_recipients (share_id, email, user_id) VALUES (10, 'viewer@example.com', 2)", [])
            .unwrap();

        let values = SessionListRepo::filter_values_for_viewer(&conn, 2, NOW, false).unwrap();
        assert_eq!(
            values,
            FilterValues {
                repos: vec!["org/api".into()],
                branches: vec!["main".into()],
                owners: vec!["owner@example.com".into()],
            }
        );

        let values = SessionListRepo::filter_values_for_viewer(&conn, 2, NOW, true).unwrap();
        assert_eq!(values.repos, vec!["org/api", "org/secret"]);
        assert_eq!(values.owners, vec!["owner@example.com", "third@example.com"]);
    }

    #[test]
    fn all_owner_emails_lowercase() {
        let conn = setup();
        assert_eq!(
            SessionListRepo::all_owner_emails(&conn).unwrap(),
            vec!["owner@example.com", "third@example.com", "viewer@example.com"]
        );
    }
}
