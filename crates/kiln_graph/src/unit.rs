//! Compilable units and their declared inputs.

use std::path::PathBuf;

use kiln_common::{ConfigDescriptor, UnitId};
use serde::{Deserialize, Serialize};

/// One compilable target: a library or binary.
///
/// Source and build-output paths are relative to the project root. The
/// dependency list is ordered as declared; it only names direct dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique logical name.
    pub id: UnitId,
    /// Source files, in declared order.
    pub sources: Vec<PathBuf>,
    /// Build-script outputs the unit consumes as inputs.
    pub build_outputs: Vec<PathBuf>,
    /// Configuration the unit is built under.
    pub config: ConfigDescriptor,
    /// Direct dependencies, in declared order.
    pub deps: Vec<UnitId>,
}

impl Unit {
    /// Creates a unit with no sources and no dependencies.
    pub fn new(id: impl Into<UnitId>, config: ConfigDescriptor) -> Self {
        Self {
            id: id.into(),
            sources: Vec::new(),
            build_outputs: Vec::new(),
            config,
            deps: Vec::new(),
        }
    }

    /// Adds a source file.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    /// Adds a declared build-script output.
    pub fn with_build_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.build_outputs.push(path.into());
        self
    }

    /// Adds a direct dependency.
    pub fn with_dep(mut self, dep: impl Into<UnitId>) -> Self {
        self.deps.push(dep.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_declared_order() {
        let unit = Unit::new("app", ConfigDescriptor::new("tc", "host", "dev"))
            .with_source("src/main.rs")
            .with_source("src/cli.rs")
            .with_dep("core")
            .with_dep("alloc");
        assert_eq!(
            unit.sources,
            vec![PathBuf::from("src/main.rs"), PathBuf::from("src/cli.rs")]
        );
        assert_eq!(unit.deps, vec![UnitId::new("core"), UnitId::new("alloc")]);
        assert!(unit.build_outputs.is_empty());
    }
}
