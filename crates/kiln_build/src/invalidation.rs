//! Staleness evaluation and propagation.
//!
//! A unit is evaluated once its direct dependencies have been settled. Its
//! verdict depends on its own stored fingerprint and on the current state of
//! those dependencies only, so a single pass in topological order propagates
//! invalidation exactly.

use std::collections::BTreeMap;
use std::path::Path;

use kiln_cache::{
    CacheError, ChangeSet, Fingerprint, FingerprintStore, RecordKey, SourceHasher, StoredRecord,
};
use kiln_common::{ContentHash, UnitId};
use kiln_graph::arena::Arena;
use kiln_graph::{UnitGraph, UnitIndex};
use tracing::debug;

use crate::verdict::{StaleReason, Verdict};

/// The settled state of a dependency as seen by its dependents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamState {
    /// The dependency's identifier.
    pub id: UnitId,
    /// The dependency's current fingerprint hash.
    pub hash: ContentHash,
    /// Whether the dependency is stale in this pass.
    pub stale: bool,
}

/// The outcome of evaluating one unit.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Whether the unit can be reused.
    pub verdict: Verdict,
    /// The fingerprint describing the unit's current inputs. This is what is
    /// saved after a successful rebuild.
    pub current: Fingerprint,
    /// The stored fingerprint, if one was valid.
    pub prior: Option<Fingerprint>,
}

impl Evaluation {
    /// The unit's current fingerprint hash.
    pub fn hash(&self) -> ContentHash {
        self.current.digest()
    }

    /// The state dependents of this unit see.
    pub fn upstream(&self) -> UpstreamState {
        UpstreamState {
            id: self.current.unit.clone(),
            hash: self.hash(),
            stale: !self.verdict.is_fresh(),
        }
    }

    /// Per-file changes against the stored fingerprint, when one exists.
    pub fn changes(&self) -> Option<ChangeSet> {
        let prior = self.prior.as_ref()?;
        let digest = kiln_cache::InputDigest {
            local: self.current.local_hash,
            files: self.current.files.clone(),
        };
        Some(SourceHasher::detect_changes(&digest, &prior.files))
    }
}

/// Decides which units are stale.
pub struct InvalidationEngine<'a> {
    graph: &'a UnitGraph,
    store: &'a dyn FingerprintStore,
    hasher: SourceHasher,
    force: bool,
}

impl<'a> InvalidationEngine<'a> {
    /// Creates an engine reading inputs relative to `root`.
    pub fn new(graph: &'a UnitGraph, store: &'a dyn FingerprintStore, root: &Path) -> Self {
        Self {
            graph,
            store,
            hasher: SourceHasher::new(root),
            force: false,
        }
    }

    /// Treats every unit as stale.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Returns the graph being evaluated.
    pub fn graph(&self) -> &'a UnitGraph {
        self.graph
    }

    /// Returns the store fingerprints are read from.
    pub fn store(&self) -> &'a dyn FingerprintStore {
        self.store
    }

    /// Evaluates one unit given the settled state of each direct dependency.
    ///
    /// Checks are applied in order and the first that applies decides the
    /// reason: missing or unreadable record, schema version, configuration,
    /// local inputs, then dependencies.
    pub fn evaluate(
        &self,
        idx: UnitIndex,
        upstream: &[UpstreamState],
    ) -> Result<Evaluation, CacheError> {
        let unit = self.graph.unit(idx);
        let digest = self.hasher.digest_unit(unit)?;
        let dep_hashes: BTreeMap<UnitId, ContentHash> = upstream
            .iter()
            .map(|dep| (dep.id.clone(), dep.hash))
            .collect();
        let current = Fingerprint::new(unit, digest, dep_hashes);

        if self.force {
            return Ok(Evaluation {
                verdict: Verdict::Stale(StaleReason::Forced),
                current,
                prior: None,
            });
        }

        let (verdict, prior) = match self.store.inspect(&RecordKey::for_unit(unit)) {
            StoredRecord::Absent | StoredRecord::Unreadable => {
                (Verdict::Stale(StaleReason::NoPriorFingerprint), None)
            }
            StoredRecord::Incompatible { .. } => {
                (Verdict::Stale(StaleReason::SchemaMismatch), None)
            }
            StoredRecord::Valid(prior) => {
                let verdict = compare(&prior, &current, upstream);
                (verdict, Some(prior))
            }
        };

        debug!(unit = %unit.id, %verdict, "evaluated");
        Ok(Evaluation {
            verdict,
            current,
            prior,
        })
    }

    /// Evaluates every unit serially in topological order without building.
    ///
    /// A unit whose inputs cannot be read is reported as such, and every unit
    /// depending on it is reported as blocked.
    pub fn plan(&self) -> Plan {
        // Settled upstream state per unit, or the unit that blocks it.
        let mut settled: Arena<UnitIndex, Option<Result<UpstreamState, UnitId>>> =
            Arena::filled(self.graph.len(), None);
        let mut entries = Vec::with_capacity(self.graph.len());

        for &idx in self.graph.topo_order() {
            let unit = self.graph.unit(idx);
            let mut upstream = Vec::with_capacity(self.graph.dependencies(idx).len());
            let mut blocked_by = None;
            for &dep in self.graph.dependencies(idx) {
                match &settled[dep] {
                    Some(Ok(state)) => upstream.push(state.clone()),
                    Some(Err(root)) => {
                        blocked_by.get_or_insert_with(|| root.clone());
                    }
                    None => {
                        blocked_by.get_or_insert_with(|| self.graph.unit(dep).id.clone());
                    }
                }
            }

            let outcome = match blocked_by {
                Some(by) => {
                    settled[idx] = Some(Err(by.clone()));
                    PlanOutcome::Blocked { by }
                }
                None => match self.evaluate(idx, &upstream) {
                    Ok(eval) => {
                        settled[idx] = Some(Ok(eval.upstream()));
                        PlanOutcome::Evaluated(eval)
                    }
                    Err(err) => {
                        settled[idx] = Some(Err(unit.id.clone()));
                        PlanOutcome::Unreadable(err.to_string())
                    }
                },
            };
            entries.push(PlanEntry {
                unit: unit.id.clone(),
                index: idx,
                outcome,
            });
        }

        Plan { entries }
    }
}

fn compare(prior: &Fingerprint, current: &Fingerprint, upstream: &[UpstreamState]) -> Verdict {
    if prior.config != current.config {
        Verdict::Stale(StaleReason::ConfigurationChanged)
    } else if prior.local_hash != current.local_hash {
        Verdict::Stale(StaleReason::LocalInputsChanged)
    } else if upstream.iter().any(|dep| dep.stale) || prior.dep_hashes != current.dep_hashes {
        Verdict::Stale(StaleReason::DependencyChanged)
    } else {
        Verdict::Fresh
    }
}

/// What a plan says about one unit.
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    /// The unit was evaluated.
    Evaluated(Evaluation),
    /// The unit's inputs could not be read.
    Unreadable(String),
    /// A dependency could not be evaluated.
    Blocked {
        /// The unit whose inputs were unreadable.
        by: UnitId,
    },
}

/// One unit in a [`Plan`].
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// The unit's identifier.
    pub unit: UnitId,
    /// The unit's index in the evaluated graph.
    pub index: UnitIndex,
    /// The evaluation result.
    pub outcome: PlanOutcome,
}

impl PlanEntry {
    /// Returns the verdict if the unit was evaluated.
    pub fn verdict(&self) -> Option<Verdict> {
        match &self.outcome {
            PlanOutcome::Evaluated(eval) => Some(eval.verdict),
            _ => None,
        }
    }
}

/// Verdicts for a whole graph, in topological order.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// One entry per unit.
    pub entries: Vec<PlanEntry>,
}

impl Plan {
    /// Finds the entry for a unit.
    pub fn get(&self, unit: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.unit.as_str() == unit)
    }

    /// Identifiers of units that need a rebuild, in topological order.
    pub fn stale_units(&self) -> Vec<&UnitId> {
        self.entries
            .iter()
            .filter(|e| e.verdict().is_some_and(|v| !v.is_fresh()))
            .map(|e| &e.unit)
            .collect()
    }

    /// Number of fresh units.
    pub fn fresh_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.verdict().is_some_and(Verdict::is_fresh))
            .count()
    }

    /// Returns `true` if some unit could not be evaluated.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|e| !matches!(e.outcome, PlanOutcome::Evaluated(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_cache::MemoryStore;
    use kiln_common::ConfigDescriptor;
    use kiln_graph::Unit;

    fn write(root: &Path, rel: &str, content: &str) {
        std::fs::write(root.join(rel), content).unwrap();
    }

    fn chain() -> UnitGraph {
        let cfg = ConfigDescriptor::new("tc", "host", "dev");
        UnitGraph::new(vec![
            Unit::new("a", cfg.clone()).with_source("a.rs"),
            Unit::new("b", cfg.clone()).with_source("b.rs").with_dep("a"),
            Unit::new("c", cfg).with_source("c.rs").with_dep("b"),
        ])
        .unwrap()
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c"] {
            write(dir.path(), &format!("{name}.rs"), name);
        }
        dir
    }

    /// Saves the current fingerprint of every unit, as a full build would.
    fn record_all(engine: &InvalidationEngine<'_>, store: &MemoryStore) {
        for entry in engine.plan().entries {
            if let PlanOutcome::Evaluated(eval) = entry.outcome {
                store.save(&eval.current.key(), &eval.current).unwrap();
            }
        }
    }

    fn reasons(plan: &Plan) -> Vec<(String, Option<StaleReason>)> {
        plan.entries
            .iter()
            .map(|e| (e.unit.to_string(), e.verdict().and_then(Verdict::reason)))
            .collect()
    }

    #[test]
    fn empty_store_everything_stale() {
        let dir = fixture();
        let graph = chain();
        let store = MemoryStore::new();
        let plan = InvalidationEngine::new(&graph, &store, dir.path()).plan();
        assert_eq!(
            reasons(&plan),
            vec![
                ("a".into(), Some(StaleReason::NoPriorFingerprint)),
                ("b".into(), Some(StaleReason::NoPriorFingerprint)),
                ("c".into(), Some(StaleReason::NoPriorFingerprint)),
            ]
        );
    }

    #[test]
    fn recorded_units_are_fresh() {
        let dir = fixture();
        let graph = chain();
        let store = MemoryStore::new();
        let engine = InvalidationEngine::new(&graph, &store, dir.path());
        record_all(&engine, &store);

        let plan = engine.plan();
        assert_eq!(plan.fresh_count(), 3);
        assert!(plan.stale_units().is_empty());
        assert!(!plan.has_errors());
    }

    #[test]
    fn change_propagates_downstream_only() {
        let dir = fixture();
        let graph = chain();
        let store = MemoryStore::new();
        let engine = InvalidationEngine::new(&graph, &store, dir.path());
        record_all(&engine, &store);

        write(dir.path(), "b.rs", "b v2");
        let plan = engine.plan();
        assert_eq!(
            reasons(&plan),
            vec![
                ("a".into(), None),
                ("b".into(), Some(StaleReason::LocalInputsChanged)),
                ("c".into(), Some(StaleReason::DependencyChanged)),
            ]
        );
        let changes = plan.get("b").and_then(|e| match &e.outcome {
            PlanOutcome::Evaluated(eval) => eval.changes(),
            _ => None,
        });
        assert_eq!(changes.unwrap().modified_files.len(), 1);
    }

    #[test]
    fn configuration_change_detected() {
        let dir = fixture();
        let graph = chain();
        let store = MemoryStore::new();
        record_all(&InvalidationEngine::new(&graph, &store, dir.path()), &store);

        // Same variant, different toolchain.
        let mut units: Vec<Unit> = graph.units().map(|(_, u)| u.clone()).collect();
        for unit in &mut units {
            unit.config.toolchain = "tc 2".into();
        }
        let upgraded = UnitGraph::new(units).unwrap();
        let plan = InvalidationEngine::new(&upgraded, &store, dir.path()).plan();
        assert_eq!(
            plan.get("a").and_then(PlanEntry::verdict),
            Some(Verdict::Stale(StaleReason::ConfigurationChanged))
        );
    }

    #[test]
    fn schema_mismatch_detected() {
        let dir = fixture();
        let graph = chain();
        let store = MemoryStore::new();
        let engine = InvalidationEngine::new(&graph, &store, dir.path());
        record_all(&engine, &store);

        let a = graph.lookup("a").unwrap();
        let key = RecordKey::for_unit(graph.unit(a));
        let mut old = store.load(&key).unwrap();
        old.schema_version = 0;
        store.insert(key, old);

        let plan = engine.plan();
        assert_eq!(
            plan.get("a").and_then(PlanEntry::verdict),
            Some(Verdict::Stale(StaleReason::SchemaMismatch))
        );
        assert_eq!(
            plan.get("b").and_then(PlanEntry::verdict),
            Some(Verdict::Stale(StaleReason::DependencyChanged))
        );
    }

    #[test]
    fn removed_dependency_is_dependency_change() {
        let dir = fixture();
        let graph = chain();
        let store = MemoryStore::new();
        record_all(&InvalidationEngine::new(&graph, &store, dir.path()), &store);

        let mut units: Vec<Unit> = graph.units().map(|(_, u)| u.clone()).collect();
        units[2].deps.clear();
        let rewired = UnitGraph::new(units).unwrap();
        let plan = InvalidationEngine::new(&rewired, &store, dir.path()).plan();
        assert_eq!(
            plan.get("c").and_then(PlanEntry::verdict),
            Some(Verdict::Stale(StaleReason::DependencyChanged))
        );
    }

    #[test]
    fn force_marks_everything() {
        let dir = fixture();
        let graph = chain();
        let store = MemoryStore::new();
        let engine = InvalidationEngine::new(&graph, &store, dir.path());
        record_all(&engine, &store);

        let plan = InvalidationEngine::new(&graph, &store, dir.path())
            .with_force(true)
            .plan();
        assert!(plan
            .entries
            .iter()
            .all(|e| e.verdict() == Some(Verdict::Stale(StaleReason::Forced))));
    }

    #[test]
    fn unreadable_input_blocks_dependents() {
        let dir = fixture();
        std::fs::remove_file(dir.path().join("a.rs")).unwrap();
        let graph = chain();
        let store = MemoryStore::new();
        let plan = InvalidationEngine::new(&graph, &store, dir.path()).plan();

        assert!(matches!(plan.get("a").unwrap().outcome, PlanOutcome::Unreadable(_)));
        for unit in ["b", "c"] {
            match &plan.get(unit).unwrap().outcome {
                PlanOutcome::Blocked { by } => assert_eq!(by.as_str(), "a"),
                other => panic!("expected blocked, got {other:?}"),
            }
        }
        assert!(plan.has_errors());
    }
}
