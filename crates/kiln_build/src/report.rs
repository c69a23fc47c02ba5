//! Build results.

use std::time::Duration;

use kiln_common::UnitId;

use crate::verdict::Verdict;

/// What happened to one unit during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The unit was fresh and its previous output was reused.
    Reused,
    /// The unit was compiled successfully.
    Rebuilt,
    /// Hashing or compilation failed.
    Failed {
        /// The error message.
        error: String,
    },
    /// A dependency failed, so the unit was not attempted.
    Blocked {
        /// The failed unit that caused the block.
        by: UnitId,
    },
    /// The build was cancelled before the unit finished.
    Cancelled,
}

impl UnitOutcome {
    /// Returns `true` for [`Reused`](Self::Reused) and [`Rebuilt`](Self::Rebuilt).
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Reused | Self::Rebuilt)
    }

    /// Lowercase name of the outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reused => "reused",
            Self::Rebuilt => "rebuilt",
            Self::Failed { .. } => "failed",
            Self::Blocked { .. } => "blocked",
            Self::Cancelled => "cancelled",
        }
    }
}

/// The result of one unit.
#[derive(Debug, Clone)]
pub struct UnitReport {
    /// The unit's identifier.
    pub unit: UnitId,
    /// What happened.
    pub outcome: UnitOutcome,
    /// The staleness verdict, if the unit was evaluated.
    pub verdict: Option<Verdict>,
    /// Wall time spent on the unit (hashing and compiling).
    pub duration: Duration,
}

/// The result of a build, one report per unit in topological order.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Per-unit results.
    pub units: Vec<UnitReport>,
    /// Total wall time.
    pub elapsed: Duration,
    /// Whether the build was cancelled.
    pub cancelled: bool,
}

impl BuildReport {
    /// Finds the report for a unit.
    pub fn get(&self, unit: &str) -> Option<&UnitReport> {
        self.units.iter().find(|r| r.unit.as_str() == unit)
    }

    /// Returns the outcome of a unit.
    pub fn outcome(&self, unit: &str) -> Option<&UnitOutcome> {
        self.get(unit).map(|r| &r.outcome)
    }

    /// Identifiers of units with the given outcome label, in report order.
    pub fn units_with(&self, label: &str) -> Vec<&UnitId> {
        self.units
            .iter()
            .filter(|r| r.outcome.label() == label)
            .map(|r| &r.unit)
            .collect()
    }

    /// Identifiers of rebuilt units, in report order.
    pub fn rebuilt(&self) -> Vec<&UnitId> {
        self.units_with("rebuilt")
    }

    /// Identifiers of reused units, in report order.
    pub fn reused(&self) -> Vec<&UnitId> {
        self.units_with("reused")
    }

    /// Number of units with the given outcome label.
    pub fn count(&self, label: &str) -> usize {
        self.units.iter().filter(|r| r.outcome.label() == label).count()
    }

    /// Returns `true` if every unit was reused or rebuilt.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.units.iter().all(|r| r.outcome.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(unit: &str, outcome: UnitOutcome) -> UnitReport {
        UnitReport {
            unit: UnitId::new(unit),
            outcome,
            verdict: None,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn counts_and_success() {
        let build = BuildReport {
            units: vec![
                report("a", UnitOutcome::Reused),
                report("b", UnitOutcome::Rebuilt),
                report("c", UnitOutcome::Rebuilt),
            ],
            ..Default::default()
        };
        assert!(build.is_success());
        assert_eq!(build.count("rebuilt"), 2);
        assert_eq!(build.reused(), vec![&UnitId::new("a")]);
        assert_eq!(build.outcome("b"), Some(&UnitOutcome::Rebuilt));
    }

    #[test]
    fn failure_is_not_success() {
        let build = BuildReport {
            units: vec![
                report("a", UnitOutcome::Failed { error: "boom".into() }),
                report("b", UnitOutcome::Blocked { by: UnitId::new("a") }),
            ],
            ..Default::default()
        };
        assert!(!build.is_success());
        assert_eq!(build.count("blocked"), 1);
    }
}
