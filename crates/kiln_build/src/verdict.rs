//! Staleness verdicts.

use std::fmt;

use serde::Serialize;

/// Why a unit must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    /// No readable fingerprint exists for the unit's configuration.
    NoPriorFingerprint,
    /// The stored fingerprint was written under another schema version.
    SchemaMismatch,
    /// The configuration descriptor differs from the stored one.
    ConfigurationChanged,
    /// Source or build-output contents changed.
    LocalInputsChanged,
    /// A direct dependency was rebuilt or its fingerprint hash changed.
    DependencyChanged,
    /// Every unit was requested to rebuild.
    Forced,
}

impl StaleReason {
    /// Short human-readable form used in progress output.
    pub fn describe(self) -> &'static str {
        match self {
            Self::NoPriorFingerprint => "no prior fingerprint",
            Self::SchemaMismatch => "fingerprint schema changed",
            Self::ConfigurationChanged => "configuration changed",
            Self::LocalInputsChanged => "inputs changed",
            Self::DependencyChanged => "dependency changed",
            Self::Forced => "forced",
        }
    }
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Whether a unit can reuse its previous build output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    /// Inputs, configuration and dependencies all match the stored fingerprint.
    Fresh,
    /// The unit must be rebuilt.
    Stale(StaleReason),
}

impl Verdict {
    /// Returns `true` for [`Verdict::Fresh`].
    pub fn is_fresh(self) -> bool {
        matches!(self, Self::Fresh)
    }

    /// Returns the stale reason, if any.
    pub fn reason(self) -> Option<StaleReason> {
        match self {
            Self::Fresh => None,
            Self::Stale(reason) => Some(reason),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => f.write_str("fresh"),
            Self::Stale(reason) => write!(f, "stale ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Verdict::Fresh.to_string(), "fresh");
        assert_eq!(
            Verdict::Stale(StaleReason::DependencyChanged).to_string(),
            "stale (dependency changed)"
        );
    }

    #[test]
    fn json_shape() {
        let fresh = serde_json::to_value(Verdict::Fresh).unwrap();
        assert_eq!(fresh, serde_json::json!({ "state": "fresh" }));
        let stale = serde_json::to_value(Verdict::Stale(StaleReason::NoPriorFingerprint)).unwrap();
        assert_eq!(
            stale,
            serde_json::json!({ "state": "stale", "reason": "no_prior_fingerprint" })
        );
    }

    #[test]
    fn reason_accessor() {
        assert!(Verdict::Fresh.is_fresh());
        assert_eq!(Verdict::Fresh.reason(), None);
        assert_eq!(
            Verdict::Stale(StaleReason::Forced).reason(),
            Some(StaleReason::Forced)
        );
    }
}
