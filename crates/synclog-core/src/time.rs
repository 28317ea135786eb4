//! Timestamp formatting for persisted values.
//!
//! All timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! precision and a `Z` suffix. Fixed width keeps lexicographic order equal to
//! chronological order, so SQL comparisons (`expires_at > ?`, `MAX(...)`) work
//! directly on the text column.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC instant in the persisted representation.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The current instant in the persisted representation.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a persisted timestamp. Accepts any RFC 3339 offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(a), "2025-01-02T03:04:05.000000Z");
    }

    #[test]
    fn lexicographic_matches_chronological() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }

    #[test]
    fn parse_roundtrips_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(at)), Some(at));
    }

    #[test]
    fn parse_accepts_offsets() {
        let parsed = parse_timestamp("2026-03-01T02:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
