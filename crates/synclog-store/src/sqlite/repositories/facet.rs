//! Facet repository: de-duplicated repository and branch names used to
//! populate session list filters.

use rusqlite::{Connection, params};
use serde::Deserialize;

use crate::errors::Result;

/// The fields of a session's git context that feed the facets.
#[derive(Debug, Default, Deserialize)]
struct GitContext {
    #[serde(default)]
    repo_url: Option<String>,
    #[serde(default)]
    branch: Option<String>,
}

/// Derive `org/repo` from a git remote URL.
///
/// Handles `https://host/org/repo(.git)` and `git@host:org/repo(.git)`.
/// Returns `None` for anything else.
pub fn extract_repo_name(url: &str) -> Option<String> {
    let url = url.trim();
    let url = url.strip_suffix(".git").unwrap_or(url);

    if let Some((_, rest)) = url.split_once("://") {
        let segments: Vec<&str> = rest
            .split('/')
            .skip(1)
            .filter(|s| !s.is_empty())
            .collect();
        return match segments.as_slice() {
            [.., org, repo] => Some(format!("{org}/{repo}")),
            _ => None,
        };
    }

    if url.contains('@') {
        let (_, path) = url.split_once(':')?;
        let path = path.trim_matches('/');
        return (!path.is_empty()).then(|| path.to_string());
    }

    None
}

/// Facet repository: stateless, every method takes `&Connection`.
pub struct FacetRepo;

impl FacetRepo {
    /// Record a repository name and/or branch, ignoring ones already known.
    pub fn upsert(conn: &Connection, repo_name: Option<&str>, branch: Option<&str>) -> Result<()> {
        if let Some(repo) = repo_name.filter(|r| !r.is_empty()) {
            let _ = conn.execute(
                "INSERT OR IGNORE INTO session_repos (repo_name) VALUES (?1)",
                params![repo],
            )?;
        }
        if let Some(branch) = branch.filter(|b| !b.is_empty()) {
            let _ = conn.execute(
                "INSERT OR IGNORE INTO session_branches (branch) VALUES (?1)",
                params![branch],
            )?;
        }
        Ok(())
    }

    /// Record the facets found in a git context JSON blob.
    pub fn upsert_from_git_info(conn: &Connection, git_info: &str) -> Result<()> {
        let ctx: GitContext = serde_json::from_str(git_info)?;
        let repo = ctx.repo_url.as_deref().and_then(extract_repo_name);
        Self::upsert(conn, repo.as_deref(), ctx.branch.as_deref())
    }

    /// Known repository names, sorted.
    pub fn list_repos(conn: &Connection) -> Result<Vec<String>> {
        Self::list(conn, "SELECT repo_name FROM session_repos ORDER BY repo_name")
    }

    /// Known branches, sorted.
    pub fn list_branches(conn: &Connection) -> Result<Vec<String>> {
        Self::list(conn, "SELECT branch FROM session_branches ORDER BY branch")
    }

    fn list(conn: &Connection, sql: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(values)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
