//! Implementation of `kiln clean`: remove fingerprint records of the selected profile.

use kiln_cache::{CacheError, ClearScope, FingerprintStore, RecordKey};
use kiln_common::UnitId;
use kiln_graph::{GraphError, UnitGraph};

use crate::pipeline::{load_project, open_store, EXIT_OK};
use crate::{CleanArgs, GlobalArgs};

/// Runs the `kiln clean` command.
pub fn run(args: &CleanArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let resolved = project.resolve(&global.profile)?;
    let graph = UnitGraph::new(resolved.units.clone())?;
    let store = open_store(&resolved);

    let removed = clean(&store, &graph, args)?;
    if !global.quiet {
        let noun = if removed == 1 { "record" } else { "records" };
        eprintln!(
            "{:>12} {removed} fingerprint {noun} ({} profile)",
            "Removed", resolved.profile.name
        );
    }
    Ok(EXIT_OK)
}

/// Removes the records `args` selects and returns how many were removed.
///
/// With `--gc`, keeps exactly the records the current manifest would read.
/// Named units must exist in the graph.
pub fn clean(
    store: &dyn FingerprintStore,
    graph: &UnitGraph,
    args: &CleanArgs,
) -> Result<usize, Box<dyn std::error::Error>> {
    if args.gc {
        let live: Vec<RecordKey> = graph
            .units()
            .map(|(_, unit)| RecordKey::for_unit(unit))
            .collect();
        return Ok(store.prune(&live)?);
    }
    if args.units.is_empty() {
        return Ok(store.clear(&ClearScope::All)?);
    }

    let mut ids = Vec::with_capacity(args.units.len());
    for name in &args.units {
        let id = UnitId::new(name.as_str());
        if graph.lookup(name).is_none() {
            return Err(GraphError::UnknownUnit(id).into());
        }
        ids.push(id);
    }
    let removed = ids
        .into_iter()
        .map(|id| store.clear(&ClearScope::Unit(id)))
        .sum::<Result<usize, CacheError>>()?;
    Ok(removed)
}
