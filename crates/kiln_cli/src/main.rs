//! Kiln CLI: the command-line interface for the kiln incremental build cache.
//!
//! Provides `kiln build` to rebuild stale units, `kiln status` to report
//! which units are stale and why, `kiln clean` to drop fingerprint records,
//! and `kiln graph` to print the build order.

#![warn(missing_docs)]

mod build;
mod clean;
mod compiler;
mod graph;
mod pipeline;
mod status;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Kiln: content-hash incremental builds.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Content-hash incremental build cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `kiln.toml` manifest.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Profile to build under.
    #[arg(short, long, global = true, default_value = kiln_config::DEFAULT_PROFILE)]
    pub profile: String,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild stale units.
    Build(BuildArgs),
    /// Show which units are stale and why.
    Status(StatusArgs),
    /// Remove fingerprint records.
    Clean(CleanArgs),
    /// Print units in build order.
    Graph,
}

/// Arguments for the `kiln build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Build only these units and their dependencies.
    #[arg(short = 'u', long = "unit")]
    pub units: Vec<String>,

    /// Maximum concurrent compilations (defaults to `build.jobs`).
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Rebuild every unit regardless of fingerprints.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `kiln status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Report only these units and their dependencies.
    #[arg(short = 'u', long = "unit")]
    pub units: Vec<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// List changed files for units whose inputs changed.
    #[arg(long)]
    pub explain: bool,
}

/// Arguments for the `kiln clean` subcommand.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Remove records of these units only.
    #[arg(short = 'u', long = "unit")]
    pub units: Vec<String>,

    /// Remove records of units no longer in the manifest.
    #[arg(long, conflicts_with = "units")]
    pub gc: bool,
}

/// Status output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom manifest.
    pub config: Option<String>,
    /// Selected profile.
    pub profile: String,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
        profile: cli.profile,
    };
    pipeline::init_logging(&global);

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Status(ref args) => status::run(args, &global),
        Command::Clean(ref args) => clean::run(args, &global),
        Command::Graph => graph::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(pipeline::exit_code_for(e.as_ref()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_build_default() {
        let cli = Cli::parse_from(["kiln", "build"]);
        assert_eq!(cli.profile, "dev");
        match cli.command {
            Command::Build(ref args) => {
                assert!(args.units.is_empty());
                assert!(args.jobs.is_none());
                assert!(!args.force);
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_build_with_args() {
        let cli = Cli::parse_from([
            "kiln", "build", "-u", "core", "--unit", "app", "-j", "8", "--force",
        ]);
        match cli.command {
            Command::Build(ref args) => {
                assert_eq!(args.units, vec!["core", "app"]);
                assert_eq!(args.jobs, Some(8));
                assert!(args.force);
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_status_json_explain() {
        let cli = Cli::parse_from(["kiln", "status", "--format", "json", "--explain"]);
        match cli.command {
            Command::Status(ref args) => {
                assert_eq!(args.format, ReportFormat::Json);
                assert!(args.explain);
            }
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn parse_clean_gc() {
        let cli = Cli::parse_from(["kiln", "clean", "--gc"]);
        match cli.command {
            Command::Clean(ref args) => {
                assert!(args.gc);
                assert!(args.units.is_empty());
            }
            _ => panic!("expected Clean command"),
        }
    }

    #[test]
    fn clean_gc_conflicts_with_units() {
        let result = Cli::try_parse_from(["kiln", "clean", "--gc", "-u", "core"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from([
            "kiln",
            "--quiet",
            "--profile",
            "release",
            "--config",
            "/work/kiln.toml",
            "graph",
        ]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.profile, "release");
        assert_eq!(cli.config.as_deref(), Some("/work/kiln.toml"));
        assert!(matches!(cli.command, Command::Graph));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["kiln", "status", "-v", "-p", "release"]);
        assert!(cli.verbose);
        assert_eq!(cli.profile, "release");
    }
}
