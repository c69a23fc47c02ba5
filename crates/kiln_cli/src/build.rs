//! Implementation of `kiln build`: rebuild stale units and record their fingerprints.

use kiln_build::{BuildOptions, BuildReport, CancelToken, Orchestrator, UnitOutcome};
use tracing::warn;

use crate::compiler::CommandCompiler;
use crate::pipeline::{
    build_graph, load_project, open_store, EXIT_CANCELLED, EXIT_FAILURE, EXIT_OK,
};
use crate::{BuildArgs, GlobalArgs};

/// Runs the `kiln build` command.
///
/// Returns 0 when every unit was reused or rebuilt, 1 when a unit failed and
/// 130 when interrupted.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let resolved = project.resolve(&global.profile)?;
    let graph = build_graph(&resolved, &args.units)?;
    let store = open_store(&resolved);

    if !global.quiet {
        eprintln!(
            "{:>12} {} ({} profile, {} units)",
            "Building",
            resolved.project_name,
            resolved.profile.name,
            graph.len()
        );
    }

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);

    let compiler = CommandCompiler::new(&project.root, resolved.commands.clone(), global.quiet);
    let options = BuildOptions {
        jobs: args.jobs.unwrap_or(resolved.jobs),
        force: args.force,
    };
    let report = Orchestrator::new(&graph, &store, &compiler, &project.root)
        .with_options(options)
        .with_cancel_token(cancel)
        .run();

    print_report(&report, &resolved.profile.name, global);
    Ok(exit_code(&report))
}

/// Cancels `token` on Ctrl-C.
fn install_interrupt_handler(token: &CancelToken) {
    let token = token.clone();
    let installed = ctrlc::set_handler(move || {
        eprintln!("\ninterrupted, waiting for running compilations to stop");
        token.cancel();
    });
    if let Err(e) = installed {
        warn!(error = %e, "cannot install interrupt handler");
    }
}

fn exit_code(report: &BuildReport) -> i32 {
    if report.cancelled {
        EXIT_CANCELLED
    } else if report.is_success() {
        EXIT_OK
    } else {
        EXIT_FAILURE
    }
}

fn print_report(report: &BuildReport, profile: &str, global: &GlobalArgs) {
    for unit in &report.units {
        match &unit.outcome {
            UnitOutcome::Failed { error } => {
                eprintln!("error: unit '{}' failed: {error}", unit.unit);
            }
            UnitOutcome::Blocked { by } if !global.quiet => {
                eprintln!("{:>12} {} (dependency '{by}' failed)", "Blocked", unit.unit);
            }
            UnitOutcome::Reused if global.verbose => {
                eprintln!("{:>12} {}", "Fresh", unit.unit);
            }
            _ => {}
        }
    }

    if !global.quiet {
        eprintln!("{:>12} {}", summary_verb(report), summary(report, profile));
    }
}

fn summary_verb(report: &BuildReport) -> &'static str {
    if report.cancelled {
        "Cancelled"
    } else if report.is_success() {
        "Finished"
    } else {
        "Failed"
    }
}

fn summary(report: &BuildReport, profile: &str) -> String {
    let mut parts = vec![
        format!("{} rebuilt", report.count("rebuilt")),
        format!("{} reused", report.count("reused")),
    ];
    for label in ["failed", "blocked", "cancelled"] {
        let n = report.count(label);
        if n > 0 {
            parts.push(format!("{n} {label}"));
        }
    }
    format!(
        "{profile} profile: {} in {:.2}s",
        parts.join(", "),
        report.elapsed.as_secs_f64()
    )
}
