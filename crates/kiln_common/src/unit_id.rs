//! Stable identifiers for compilable units.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// The logical name of a unit (one library or binary target).
///
/// Ordering is lexicographic on the name; it is the tie-breaker wherever a
/// deterministic order over units is required.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Creates a unit identifier from its logical name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name with every character outside `[A-Za-z0-9_.]`
    /// replaced by `_`, suitable for use in a file name.
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

impl From<&str> for UnitId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for UnitId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for UnitId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic() {
        let mut ids = vec![UnitId::new("b"), UnitId::new("a"), UnitId::new("c")];
        ids.sort();
        let names: Vec<_> = ids.iter().map(UnitId::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn file_stem_replaces_separators() {
        assert_eq!(UnitId::new("net/http-client").file_stem(), "net_http_client");
        assert_eq!(UnitId::new("core_v2.1").file_stem(), "core_v2.1");
    }

    #[test]
    fn serde_is_transparent() {
        let id = UnitId::new("core");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"core\"");
    }

    #[test]
    fn borrow_as_str_for_lookup() {
        let mut set = std::collections::HashSet::new();
        set.insert(UnitId::new("core"));
        assert!(set.contains("core"));
    }
}
