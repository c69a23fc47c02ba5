//! Implementation of `kiln status`: report which units are stale and why, without building.

use std::fmt::Write as _;

use kiln_build::{InvalidationEngine, Plan, PlanOutcome, StaleReason, Verdict};
use serde_json::{json, Value};

use crate::pipeline::{build_graph, load_project, open_store, EXIT_FAILURE, EXIT_OK};
use crate::{GlobalArgs, ReportFormat, StatusArgs};

/// Runs the `kiln status` command.
///
/// Prints one line per unit in build order. Returns 1 if some unit could not
/// be evaluated, 0 otherwise.
pub fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let resolved = project.resolve(&global.profile)?;
    let graph = build_graph(&resolved, &args.units)?;
    let store = open_store(&resolved);

    let plan = InvalidationEngine::new(&graph, &store, &project.root).plan();
    match args.format {
        ReportFormat::Text => print!("{}", render_text(&plan, args.explain)),
        ReportFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&render_json(&plan, args.explain))?
        ),
    }

    Ok(if plan.has_errors() { EXIT_FAILURE } else { EXIT_OK })
}

/// Renders the plan as aligned text lines.
pub fn render_text(plan: &Plan, explain: bool) -> String {
    let width = plan
        .entries
        .iter()
        .map(|e| e.unit.as_str().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for entry in &plan.entries {
        let state = match &entry.outcome {
            PlanOutcome::Evaluated(eval) => eval.verdict.to_string(),
            PlanOutcome::Unreadable(error) => format!("error: {error}"),
            PlanOutcome::Blocked { by } => format!("blocked by '{by}'"),
        };
        let _ = writeln!(out, "{:<width$}  {state}", entry.unit.as_str());

        if !explain {
            continue;
        }
        let PlanOutcome::Evaluated(eval) = &entry.outcome else {
            continue;
        };
        if eval.verdict != Verdict::Stale(StaleReason::LocalInputsChanged) {
            continue;
        }
        if let Some(changes) = eval.changes() {
            for (label, files) in [
                ("new", &changes.new_files),
                ("modified", &changes.modified_files),
                ("deleted", &changes.deleted_files),
            ] {
                for file in files {
                    let _ = writeln!(out, "{:<width$}    {label}: {}", "", file.display());
                }
            }
        }
    }
    out
}

/// Renders the plan as a JSON array.
pub fn render_json(plan: &Plan, explain: bool) -> Value {
    let entries = plan
        .entries
        .iter()
        .map(|entry| match &entry.outcome {
            PlanOutcome::Evaluated(eval) => {
                let mut value = json!({
                    "unit": entry.unit.as_str(),
                    "verdict": eval.verdict,
                    "local_hash": eval.current.local_hash.to_string(),
                    "fingerprint": eval.hash().to_string(),
                });
                if explain {
                    if let Some(changes) = eval.changes() {
                        value["changes"] = json!({
                            "new": changes.new_files,
                            "modified": changes.modified_files,
                            "deleted": changes.deleted_files,
                        });
                    }
                }
                value
            }
            PlanOutcome::Unreadable(error) => json!({
                "unit": entry.unit.as_str(),
                "error": error,
            }),
            PlanOutcome::Blocked { by } => json!({
                "unit": entry.unit.as_str(),
                "blocked_by": by.as_str(),
            }),
        })
        .collect();
    Value::Array(entries)
}
