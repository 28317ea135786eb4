//! Branded ID newtypes.
//!
//! A [`SessionId`] is the server-generated primary key of a recorded session
//! (UUID v7, used in URLs). An [`ExternalId`] is the identifier a sync client
//! chose for the same session; it is opaque and only unique per owning user.
//! Keeping them as distinct types stops one being passed where the other is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value without validation.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Server-generated identifier for a recorded session.
    SessionId
}

branded_id! {
    /// Client-supplied identifier for a recorded session, unique per user.
    ExternalId
}

impl SessionId {
    /// Create a new random session ID (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Parse a caller-supplied session ID.
    ///
    /// Returns `None` when `raw` is not a UUID. The value is normalized to the
    /// lowercase hyphenated form that [`SessionId::new`] produces, so a lookup
    /// by the returned ID matches the stored key.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw)
            .ok()
            .map(|uuid| Self(uuid.hyphenated().to_string()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ExternalId {
    fn default() -> Self {
        Self(String::new())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_new_is_uuid_v7() {
        let id = SessionId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn parse_accepts_generated_id() {
        let id = SessionId::new();
        assert_eq!(SessionId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn parse_normalizes_uppercase() {
        let id = SessionId::new();
        let upper = id.as_str().to_uppercase();
        assert_eq!(SessionId::parse(&upper), Some(id));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(SessionId::parse(""), None);
        assert_eq!(SessionId::parse("not-a-uuid"), None);
        assert_eq!(SessionId::parse("12345"), None);
        assert_eq!(SessionId::parse("' OR 1=1 --"), None);
    }

    #[test]
    fn external_id_is_opaque() {
        let id = ExternalId::from("claude-session-abc");
        assert_eq!(id.as_str(), "claude-session-abc");
    }

    #[test]
    fn deref_to_str() {
        let id = ExternalId::from("hello");
        let s: &str = &id;
        assert_eq!(s, "hello");
    }

    #[test]
    fn display() {
        let id = SessionId::from("display-me");
        assert_eq!(format!("{id}"), "display-me");
    }

    #[test]
    fn into_string() {
        let id = ExternalId::from("convert");
        let s: String = id.into();
        assert_eq!(s, "convert");
    }

    #[test]
    fn serde_is_transparent() {
        let id = SessionId::from("serde-test");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"serde-test\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn hash_and_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let id = SessionId::from("same");
        let _ = set.insert(id.clone());
        let _ = set.insert(id.clone());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn default_creates_new() {
        assert_ne!(SessionId::default(), SessionId::default());
    }
}
