//! Type-safe rocket identifier.
//!
//! Rocket IDs are human-readable word pairs (e.g. `amber-falcon`) drawn by
//! the ID generator. They appear as a single segment of every routing key
//! (`rocket.<id>.<event>`) and as the last segment of the storage key
//! (`rocket:{owner}:{id}`), so they must never contain a `.`, a `:` or a
//! wildcard character.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Unique identifier for a rocket.
///
/// Unique across all owners: the ID generator checks global non-existence
/// before handing one out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct RocketId(pub String);

impl RocketId {
    /// Wrap an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identifier can be used as a routing key segment.
    ///
    /// Rejects empty IDs and IDs containing `.`, `:`, `*`, `>` or
    /// whitespace. Any ID taken from a request must pass this before it is
    /// used as a key or a subscription pattern.
    pub fn is_routable(&self) -> bool {
        !self.0.is_empty()
            && !self
                .0
                .chars()
                .any(|c| matches!(c, '.' | ':' | '*' | '>') || c.is_whitespace())
    }
}

impl core::fmt::Display for RocketId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RocketId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for RocketId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_plain_string() {
        let id = RocketId::new("amber-falcon");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"amber-falcon\"");
    }

    #[test]
    fn routable_ids() {
        assert!(RocketId::new("amber-falcon").is_routable());
        assert!(!RocketId::new("").is_routable());
        assert!(!RocketId::new("a.b").is_routable());
        assert!(!RocketId::new("*").is_routable());
        assert!(!RocketId::new("two words").is_routable());
        assert!(!RocketId::new("b:amber-falcon").is_routable());
    }
}
