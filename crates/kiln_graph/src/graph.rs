//! The unit dependency graph.
//!
//! [`UnitGraph`] validates declared dependencies, rejects cycles, and exposes a
//! deterministic topological order along with forward and reverse edges.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use kiln_common::UnitId;

use crate::arena::Arena;
use crate::error::GraphError;
use crate::ids::UnitIndex;
use crate::unit::Unit;

/// DFS colouring used by cycle detection.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// A validated, acyclic graph of units.
///
/// Units are stored in identifier order, so [`UnitIndex`] order coincides
/// with [`UnitId`] order. Immutable once built.
#[derive(Debug, Clone)]
pub struct UnitGraph {
    units: Arena<UnitIndex, Unit>,
    index: HashMap<UnitId, UnitIndex>,
    deps: Arena<UnitIndex, Vec<UnitIndex>>,
    dependents: Arena<UnitIndex, Vec<UnitIndex>>,
    order: Vec<UnitIndex>,
    rank: Arena<UnitIndex, usize>,
}

impl UnitGraph {
    /// Builds a graph from units and their declared dependencies.
    ///
    /// Fails on duplicate identifiers, on dependencies naming unknown units,
    /// and on cycles. Duplicate edges are collapsed.
    pub fn new(mut units: Vec<Unit>) -> Result<Self, GraphError> {
        units.sort_by(|a, b| a.id.cmp(&b.id));

        let mut arena = Arena::new();
        let mut index = HashMap::with_capacity(units.len());
        for unit in units {
            if index.contains_key(&unit.id) {
                return Err(GraphError::DuplicateUnit(unit.id));
            }
            let id = unit.id.clone();
            let idx = arena.push(unit);
            index.insert(id, idx);
        }

        let mut deps: Arena<UnitIndex, Vec<UnitIndex>> = Arena::new();
        for (_, unit) in arena.iter() {
            let mut edges = Vec::with_capacity(unit.deps.len());
            for dep in &unit.deps {
                let target = *index.get(dep).ok_or_else(|| GraphError::UnknownDependency {
                    unit: unit.id.clone(),
                    dependency: dep.clone(),
                })?;
                if !edges.contains(&target) {
                    edges.push(target);
                }
            }
            deps.push(edges);
        }

        let mut dependents: Arena<UnitIndex, Vec<UnitIndex>> =
            Arena::filled(arena.len(), Vec::new());
        for (idx, edges) in deps.iter() {
            for &dep in edges {
                dependents[dep].push(idx);
            }
        }
        for idx in arena.indices() {
            dependents[idx].sort();
        }

        if let Some(cycle) = find_cycle(&deps) {
            return Err(GraphError::CyclicDependency {
                cycle: cycle.into_iter().map(|i| arena[i].id.clone()).collect(),
            });
        }

        let order = topological_order(&deps, &dependents);
        let mut rank = Arena::filled(arena.len(), 0);
        for (pos, &idx) in order.iter().enumerate() {
            rank[idx] = pos;
        }

        Ok(Self {
            units: arena,
            index,
            deps,
            dependents,
            order,
            rank,
        })
    }

    /// Returns the number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the graph has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns the unit at `idx`.
    pub fn unit(&self, idx: UnitIndex) -> &Unit {
        &self.units[idx]
    }

    /// Looks up a unit by identifier.
    pub fn lookup(&self, id: &str) -> Option<UnitIndex> {
        self.index.get(id).copied()
    }

    /// Iterates over all units in identifier order.
    pub fn units(&self) -> impl Iterator<Item = (UnitIndex, &Unit)> {
        self.units.iter()
    }

    /// Returns every unit index, dependencies before dependents. Ties are
    /// broken by unit identifier.
    pub fn topo_order(&self) -> &[UnitIndex] {
        &self.order
    }

    /// Position of `idx` in [`topo_order`](Self::topo_order).
    pub fn rank(&self, idx: UnitIndex) -> usize {
        self.rank[idx]
    }

    /// Direct dependencies of `idx`, in declared order.
    pub fn dependencies(&self, idx: UnitIndex) -> &[UnitIndex] {
        &self.deps[idx]
    }

    /// Units that directly depend on `idx`, in identifier order.
    pub fn dependents(&self, idx: UnitIndex) -> &[UnitIndex] {
        &self.dependents[idx]
    }

    /// All units that depend on `idx` directly or transitively, in
    /// topological order. Does not include `idx` itself.
    pub fn transitive_dependents(&self, idx: UnitIndex) -> Vec<UnitIndex> {
        let mut seen = HashSet::new();
        let mut stack: Vec<UnitIndex> = self.dependents(idx).to_vec();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend_from_slice(self.dependents(next));
            }
        }
        let mut result: Vec<UnitIndex> = seen.into_iter().collect();
        result.sort_by_key(|&i| self.rank(i));
        result
    }

    /// Returns the subgraph made of `roots` and everything they depend on.
    pub fn restrict_to(&self, roots: &[UnitId]) -> Result<Self, GraphError> {
        let mut keep = HashSet::new();
        let mut stack = Vec::with_capacity(roots.len());
        for root in roots {
            let idx = self
                .lookup(root.as_str())
                .ok_or_else(|| GraphError::UnknownUnit(root.clone()))?;
            stack.push(idx);
        }
        while let Some(next) = stack.pop() {
            if keep.insert(next) {
                stack.extend_from_slice(self.dependencies(next));
            }
        }
        let units = self
            .units
            .iter()
            .filter(|(idx, _)| keep.contains(idx))
            .map(|(_, unit)| unit.clone())
            .collect();
        Self::new(units)
    }
}

/// Depth-first search with visiting/visited marks. Returns the first cycle
/// found as a path whose last element repeats its first.
fn find_cycle(deps: &Arena<UnitIndex, Vec<UnitIndex>>) -> Option<Vec<UnitIndex>> {
    let mut marks: Arena<UnitIndex, Mark> = Arena::filled(deps.len(), Mark::Unvisited);
    let mut stack: Vec<(UnitIndex, usize)> = Vec::new();

    for root in deps.indices() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::Visiting;
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let Some(&child) = deps[node].get(top.1) else {
                marks[node] = Mark::Visited;
                stack.pop();
                continue;
            };
            top.1 += 1;
            match marks[child] {
                Mark::Unvisited => {
                    marks[child] = Mark::Visiting;
                    stack.push((child, 0));
                }
                Mark::Visiting => {
                    let start = stack.iter().position(|&(n, _)| n == child).unwrap_or(0);
                    let mut cycle: Vec<UnitIndex> =
                        stack[start..].iter().map(|&(n, _)| n).collect();
                    cycle.push(child);
                    return Some(cycle);
                }
                Mark::Visited => {}
            }
        }
    }
    None
}

/// Kahn's algorithm with a min-heap so that ready units are emitted in index
/// (and therefore identifier) order.
fn topological_order(
    deps: &Arena<UnitIndex, Vec<UnitIndex>>,
    dependents: &Arena<UnitIndex, Vec<UnitIndex>>,
) -> Vec<UnitIndex> {
    let mut remaining: Arena<UnitIndex, usize> = Arena::filled(deps.len(), 0);
    let mut ready = BinaryHeap::new();
    for (idx, edges) in deps.iter() {
        remaining[idx] = edges.len();
        if edges.is_empty() {
            ready.push(Reverse(idx));
        }
    }

    let mut order = Vec::with_capacity(deps.len());
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &dependent in &dependents[idx] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::ConfigDescriptor;

    fn unit(name: &str, deps: &[&str]) -> Unit {
        let mut u = Unit::new(name, ConfigDescriptor::new("tc", "host", "dev"));
        for d in deps {
            u = u.with_dep(*d);
        }
        u
    }

    fn names(graph: &UnitGraph, idxs: &[UnitIndex]) -> Vec<String> {
        idxs.iter().map(|&i| graph.unit(i).id.to_string()).collect()
    }

    #[test]
    fn empty_graph() {
        let g = UnitGraph::new(vec![]).unwrap();
        assert!(g.is_empty());
        assert!(g.topo_order().is_empty());
    }

    #[test]
    fn chain_orders_dependencies_first() {
        let g = UnitGraph::new(vec![
            unit("c", &["b"]),
            unit("b", &["a"]),
            unit("a", &[]),
        ])
        .unwrap();
        assert_eq!(names(&g, g.topo_order()), vec!["a", "b", "c"]);
    }

    #[test]
    fn ties_broken_by_identifier() {
        let g = UnitGraph::new(vec![
            unit("zeta", &[]),
            unit("alpha", &[]),
            unit("app", &["zeta", "alpha"]),
            unit("mid", &[]),
        ])
        .unwrap();
        assert_eq!(
            names(&g, g.topo_order()),
            vec!["alpha", "mid", "zeta", "app"]
        );
    }

    #[test]
    fn unknown_dependency_rejected() {
        let err = UnitGraph::new(vec![unit("app", &["ghost"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownDependency {
                unit: UnitId::new("app"),
                dependency: UnitId::new("ghost"),
            }
        );
    }

    #[test]
    fn duplicate_unit_rejected() {
        let err = UnitGraph::new(vec![unit("a", &[]), unit("a", &[])]).unwrap_err();
        assert_eq!(err, GraphError::DuplicateUnit(UnitId::new("a")));
    }

    #[test]
    fn cycle_is_named() {
        let err = UnitGraph::new(vec![
            unit("a", &["b"]),
            unit("b", &["c"]),
            unit("c", &["a"]),
            unit("d", &[]),
        ])
        .unwrap_err();
        match err {
            GraphError::CyclicDependency { cycle } => {
                let cycle: Vec<_> = cycle.iter().map(|u| u.to_string()).collect();
                assert_eq!(cycle, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = UnitGraph::new(vec![unit("a", &["a"])]).unwrap_err();
        assert!(matches!(err, GraphError::CyclicDependency { ref cycle } if cycle.len() == 2));
    }

    #[test]
    fn reverse_edges() {
        let g = UnitGraph::new(vec![
            unit("a", &[]),
            unit("b", &["a"]),
            unit("c", &["a", "a"]),
        ])
        .unwrap();
        let a = g.lookup("a").unwrap();
        let c = g.lookup("c").unwrap();
        assert_eq!(names(&g, g.dependents(a)), vec!["b", "c"]);
        assert_eq!(g.dependencies(c).len(), 1, "duplicate edges collapse");
    }

    #[test]
    fn transitive_dependents_in_diamond() {
        let g = UnitGraph::new(vec![
            unit("base", &[]),
            unit("left", &["base"]),
            unit("right", &["base"]),
            unit("top", &["left", "right"]),
            unit("other", &[]),
        ])
        .unwrap();
        let base = g.lookup("base").unwrap();
        assert_eq!(
            names(&g, &g.transitive_dependents(base)),
            vec!["left", "right", "top"]
        );
        let other = g.lookup("other").unwrap();
        assert!(g.transitive_dependents(other).is_empty());
    }

    #[test]
    fn rank_matches_order() {
        let g = UnitGraph::new(vec![unit("b", &["a"]), unit("a", &[])]).unwrap();
        for (pos, &idx) in g.topo_order().iter().enumerate() {
            assert_eq!(g.rank(idx), pos);
        }
    }

    #[test]
    fn restrict_to_keeps_dependency_closure() {
        let g = UnitGraph::new(vec![
            unit("a", &[]),
            unit("b", &["a"]),
            unit("c", &["b"]),
            unit("d", &[]),
        ])
        .unwrap();
        let sub = g.restrict_to(&[UnitId::new("b")]).unwrap();
        assert_eq!(names(&sub, sub.topo_order()), vec!["a", "b"]);
    }

    #[test]
    fn restrict_to_unknown_root() {
        let g = UnitGraph::new(vec![unit("a", &[])]).unwrap();
        let err = g.restrict_to(&[UnitId::new("zzz")]).unwrap_err();
        assert_eq!(err, GraphError::UnknownUnit(UnitId::new("zzz")));
    }
}
