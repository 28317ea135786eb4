//! Search-query helpers.
//!
//! [`build_prefix_query`] turns free text typed into a search box into a
//! prefix-match boolean expression (`term:* & term:*`), and
//! [`build_fts_match`] renders the same terms for an `SQLite` FTS5 `MATCH`.
//! Characters with
//! meaning in the query grammar (`&`, `|`, `!`, `(`, `)`, `:`, quotes,
//! backslashes) are removed so user input can never change the shape of the
//! expression.

/// Separator placed between prefix terms.
const AND: &str = " & ";

/// Suffix that turns a term into a prefix match.
const PREFIX: &str = ":*";

/// Whether `c` survives token sanitization.
fn is_term_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '.'
}

/// Build a prefix-match expression from free text.
///
/// Splits on whitespace, strips every character that is not alphanumeric,
/// `-` or `.`, drops tokens left empty, and joins the rest as
/// `tok:* & tok:*`. Returns an empty string when nothing survives.
///
/// ```text
/// "auth flow"    => "auth:* & flow:*"
/// "auth|flow()"  => "authflow:*"
/// "&|!()"        => ""
/// ```
pub fn build_prefix_query(input: &str) -> String {
    let terms: Vec<String> = search_terms(input)
        .into_iter()
        .map(|term| format!("{term}{PREFIX}"))
        .collect();
    terms.join(AND)
}

/// Sanitized, non-empty search terms in input order.
pub fn search_terms(input: &str) -> Vec<String> {
    input
        .split_whitespace()
        .map(|token| token.chars().filter(|c| is_term_char(*c)).collect::<String>())
        .filter(|term| !term.is_empty())
        .collect()
}

/// Build an FTS5 prefix-match expression from free text.
///
/// Takes the terms of [`build_prefix_query`], quotes each as a prefix phrase
/// and joins them with `AND`. Terms without a letter or digit are dropped,
/// as FTS5 indexes no token for them. `None` when nothing survives.
///
/// ```text
/// "auth flow"    => "\"auth\"* AND \"flow\"*"
/// "- . auth"     => "\"auth\"*"
/// "&|!()"        => None
/// ```
pub fn build_fts_match(input: &str) -> Option<String> {
    let terms: Vec<String> = search_terms(input)
        .into_iter()
        .filter(|term| term.chars().any(char::is_alphanumeric))
        .map(|term| format!("\"{term}\"*"))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" AND "))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
