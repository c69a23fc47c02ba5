//! Implementation of `kiln graph`: print units in build order.

use std::fmt::Write as _;

use kiln_graph::UnitGraph;

use crate::pipeline::{load_project, EXIT_OK};
use crate::GlobalArgs;

/// Runs the `kiln graph` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let resolved = project.resolve(&global.profile)?;
    let graph = UnitGraph::new(resolved.units)?;
    print!("{}", render(&graph));
    Ok(EXIT_OK)
}

/// One numbered line per unit in topological order, followed by its direct
/// dependencies.
pub fn render(graph: &UnitGraph) -> String {
    let mut out = String::new();
    for &idx in graph.topo_order() {
        let unit = graph.unit(idx);
        let _ = write!(out, "{:>3}  {}", graph.rank(idx) + 1, unit.id);
        let deps: Vec<&str> = graph
            .dependencies(idx)
            .iter()
            .map(|&dep| graph.unit(dep).id.as_str())
            .collect();
        if !deps.is_empty() {
            let _ = write!(out, " <- {}", deps.join(", "));
        }
        out.push('\n');
    }
    out
}
