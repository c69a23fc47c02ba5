//! Profile resolution: turning a manifest into the units of one build.

use crate::error::ConfigError;
use crate::types::{ProfileConfig, ProjectConfig};
use kiln_common::{ConfigDescriptor, UnitId};
use kiln_graph::Unit;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Profile used when none is requested.
pub const DEFAULT_PROFILE: &str = "dev";

/// A profile with built-in defaults and manifest overrides merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    /// The profile name.
    pub name: String,
    /// Optimization level.
    pub opt_level: u8,
    /// Whether debug info is emitted.
    pub debug: bool,
    /// Features enabled for every unit.
    pub features: BTreeSet<String>,
}

/// Everything a build invocation needs from the manifest.
#[derive(Debug, Clone)]
pub struct ResolvedBuild {
    /// The project name.
    pub project_name: String,
    /// The selected profile.
    pub profile: ResolvedProfile,
    /// Absolute cache directory (`<project>/<build.cache_dir>`).
    pub cache_dir: PathBuf,
    /// Worker count with `0` already replaced by the available parallelism.
    pub jobs: usize,
    /// The units, each with its full configuration descriptor.
    pub units: Vec<Unit>,
    /// Compile command template per unit.
    pub commands: BTreeMap<UnitId, Vec<String>>,
}

fn builtin_profile(name: &str) -> Option<ProfileConfig> {
    match name {
        "dev" => Some(ProfileConfig {
            opt_level: 0,
            debug: true,
            features: Vec::new(),
        }),
        "release" => Some(ProfileConfig {
            opt_level: 3,
            debug: false,
            features: Vec::new(),
        }),
        _ => None,
    }
}

/// Resolves a profile by name.
///
/// A profile declared in the manifest replaces the built-in profile of the
/// same name entirely.
pub fn resolve_profile(config: &ProjectConfig, name: &str) -> Result<ResolvedProfile, ConfigError> {
    let profile = config
        .profiles
        .get(name)
        .cloned()
        .or_else(|| builtin_profile(name))
        .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

    Ok(ResolvedProfile {
        name: name.to_string(),
        opt_level: profile.opt_level,
        debug: profile.debug,
        features: profile.features.into_iter().collect(),
    })
}

/// Resolves the manifest for one profile.
///
/// Each unit's descriptor combines the project toolchain and target, the
/// profile settings, the union of profile and unit features, and the current
/// value of every declared environment variable as reported by `env`.
pub fn resolve_build(
    config: &ProjectConfig,
    project_dir: &Path,
    profile: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedBuild, ConfigError> {
    let profile = resolve_profile(config, profile)?;

    let mut units = Vec::with_capacity(config.units.len());
    let mut commands = BTreeMap::new();
    for (name, unit_cfg) in &config.units {
        let mut descriptor = ConfigDescriptor::new(
            &config.project.toolchain,
            &config.project.target,
            &profile.name,
        );
        descriptor.opt_level = profile.opt_level;
        descriptor.debug = profile.debug;
        descriptor.features = profile
            .features
            .iter()
            .cloned()
            .chain(unit_cfg.features.iter().cloned())
            .collect();
        descriptor.env = unit_cfg
            .env
            .iter()
            .map(|var| (var.clone(), env(var)))
            .collect();

        let mut unit = Unit::new(name.as_str(), descriptor);
        unit.sources = unit_cfg.sources.iter().map(PathBuf::from).collect();
        unit.build_outputs = unit_cfg.build_outputs.iter().map(PathBuf::from).collect();
        unit.deps = unit_cfg.deps.iter().map(|d| UnitId::new(d.as_str())).collect();

        let command = unit_cfg
            .command
            .clone()
            .unwrap_or_else(|| config.build.command.clone());
        commands.insert(unit.id.clone(), command);
        units.push(unit);
    }

    let jobs = match config.build.jobs {
        0 => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        n => n,
    };

    Ok(ResolvedBuild {
        project_name: config.project.name.clone(),
        profile,
        cache_dir: project_dir.join(&config.build.cache_dir),
        jobs,
        units,
        commands,
    })
}
