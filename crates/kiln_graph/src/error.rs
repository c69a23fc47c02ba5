//! Error types for dependency graph construction.

use kiln_common::UnitId;

/// Configuration errors detected while building a [`UnitGraph`](crate::UnitGraph).
///
/// All of these are fatal for a run and are reported before any hashing or
/// cache mutation happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A unit declares a dependency on a unit that does not exist.
    #[error("unit '{unit}' depends on unknown unit '{dependency}'")]
    UnknownDependency {
        /// The unit declaring the dependency.
        unit: UnitId,
        /// The missing dependency.
        dependency: UnitId,
    },

    /// A requested unit does not exist in the graph.
    #[error("unknown unit '{0}'")]
    UnknownUnit(UnitId),

    /// Two units share the same identifier.
    #[error("unit '{0}' is defined more than once")]
    DuplicateUnit(UnitId),

    /// The dependency edges form a cycle.
    #[error("dependency cycle: {}", format_cycle(.cycle))]
    CyclicDependency {
        /// The units on the cycle; the first unit is repeated at the end.
        cycle: Vec<UnitId>,
    },
}

fn format_cycle(cycle: &[UnitId]) -> String {
    cycle
        .iter()
        .map(UnitId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_dependency_display() {
        let err = GraphError::UnknownDependency {
            unit: UnitId::new("app"),
            dependency: UnitId::new("missing"),
        };
        assert_eq!(
            err.to_string(),
            "unit 'app' depends on unknown unit 'missing'"
        );
    }

    #[test]
    fn cycle_display_names_path() {
        let err = GraphError::CyclicDependency {
            cycle: vec![UnitId::new("a"), UnitId::new("b"), UnitId::new("a")],
        };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn duplicate_display() {
        let err = GraphError::DuplicateUnit(UnitId::new("core"));
        assert!(err.to_string().contains("more than once"));
    }
}
