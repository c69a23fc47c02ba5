//! Shared helpers for CLI commands.
//!
//! Contains project discovery, manifest resolution, graph construction,
//! logging setup and the mapping from errors to exit codes.

use std::error::Error;
use std::path::{Path, PathBuf};

use kiln_cache::DiskStore;
use kiln_common::UnitId;
use kiln_config::{ConfigError, ProjectConfig, ResolvedBuild, MANIFEST_NAME};
use kiln_graph::{GraphError, UnitGraph};
use tracing::Level;

use crate::GlobalArgs;

/// Exit code for a successful run.
pub const EXIT_OK: i32 = 0;
/// Exit code when a unit failed.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for manifest and graph errors.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code after an interrupt.
pub const EXIT_CANCELLED: i32 = 130;

/// No `kiln.toml` was found.
#[derive(Debug, thiserror::Error)]
#[error("could not find kiln.toml in {} or any parent directory", .start.display())]
pub struct ManifestNotFound {
    /// Directory the search started from.
    pub start: PathBuf,
}

/// A loaded project: its root directory and manifest.
pub struct Project {
    /// Directory containing the manifest. Unit paths are relative to it.
    pub root: PathBuf,
    /// The validated manifest.
    pub config: ProjectConfig,
}

impl Project {
    /// Resolves the manifest for `profile`, reading declared environment
    /// variables from the process environment.
    pub fn resolve(&self, profile: &str) -> Result<ResolvedBuild, ConfigError> {
        kiln_config::resolve_build(&self.config, &self.root, profile, |var| {
            std::env::var(var).ok()
        })
    }
}

/// Walks up from `start` looking for the nearest directory containing `kiln.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, ManifestNotFound> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(MANIFEST_NAME).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ManifestNotFound {
                start: start.to_path_buf(),
            });
        }
    }
}

/// Loads the project selected by the global CLI args.
///
/// If `--config` is specified, uses that path (file → its manifest, dir →
/// `<dir>/kiln.toml`). Otherwise walks up from the current directory.
pub fn load_project(global: &GlobalArgs) -> Result<Project, Box<dyn Error>> {
    match global.config {
        Some(ref config_path) => {
            let path = PathBuf::from(config_path);
            if path.is_file() {
                let root = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                let config = kiln_config::load_config_file(&path)?;
                Ok(Project { root, config })
            } else {
                let config = kiln_config::load_config(&path)?;
                Ok(Project { root: path, config })
            }
        }
        None => {
            let root = find_project_root(&std::env::current_dir()?)?;
            let config = kiln_config::load_config(&root)?;
            Ok(Project { root, config })
        }
    }
}

/// Builds the unit graph, restricted to `units` and their dependencies when
/// any are named.
pub fn build_graph(resolved: &ResolvedBuild, units: &[String]) -> Result<UnitGraph, GraphError> {
    let graph = UnitGraph::new(resolved.units.clone())?;
    if units.is_empty() {
        return Ok(graph);
    }
    let roots: Vec<UnitId> = units.iter().map(|u| UnitId::new(u.as_str())).collect();
    graph.restrict_to(&roots)
}

/// Opens the fingerprint store of the resolved profile.
pub fn open_store(resolved: &ResolvedBuild) -> DiskStore {
    DiskStore::for_profile(&resolved.cache_dir, &resolved.profile.name)
}

/// Installs the stderr log subscriber: errors only with `--quiet`, debug
/// with `--verbose`, warnings otherwise.
pub fn init_logging(global: &GlobalArgs) {
    let level = if global.quiet {
        Level::ERROR
    } else if global.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// Maps a command error to the process exit code.
pub fn exit_code_for(err: &(dyn Error + 'static)) -> i32 {
    if err.is::<ConfigError>() || err.is::<GraphError>() || err.is::<ManifestNotFound>() {
        EXIT_CONFIG
    } else {
        EXIT_FAILURE
    }
}
