//! Manifest types deserialized from `kiln.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;

/// The top-level project manifest parsed from `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata (name, toolchain, target).
    pub project: ProjectMeta,
    /// Cache location, parallelism and the default compile command.
    #[serde(default)]
    pub build: BuildSettings,
    /// Named optimization profiles. Override or extend the built-in `dev`
    /// and `release` profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
    /// Compilable units keyed by their identifier.
    #[serde(default)]
    pub units: BTreeMap<String, UnitConfig>,
}

/// Project metadata required in every `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// Toolchain identifier recorded in every configuration descriptor.
    pub toolchain: String,
    /// Target triple. Defaults to `"host"`.
    #[serde(default = "default_target")]
    pub target: String,
}

fn default_target() -> String {
    "host".to_string()
}

/// The `[build]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSettings {
    /// Cache directory relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Maximum concurrent compilations; `0` uses the available parallelism.
    #[serde(default)]
    pub jobs: usize,
    /// Default compile command. Arguments may contain `{unit}`, `{profile}`
    /// and `{target}` placeholders.
    #[serde(default)]
    pub command: Vec<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            jobs: 0,
            command: Vec::new(),
        }
    }
}

fn default_cache_dir() -> String {
    ".kiln".to_string()
}

/// A `[profiles.<name>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileConfig {
    /// Optimization level, 0 through 3.
    #[serde(default)]
    pub opt_level: u8,
    /// Whether debug info is emitted.
    #[serde(default)]
    pub debug: bool,
    /// Features enabled for every unit under this profile.
    #[serde(default)]
    pub features: Vec<String>,
}

/// A `[units.<id>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitConfig {
    /// Source files relative to the project root, in order.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Identifiers of direct dependencies.
    #[serde(default)]
    pub deps: Vec<String>,
    /// Features enabled for this unit in addition to the profile's.
    #[serde(default)]
    pub features: Vec<String>,
    /// Names of environment variables that affect this unit's output.
    #[serde(default)]
    pub env: Vec<String>,
    /// Build-script outputs consumed as inputs, relative to the project root.
    #[serde(default)]
    pub build_outputs: Vec<String>,
    /// Compile command overriding `build.command` for this unit.
    #[serde(default)]
    pub command: Option<Vec<String>>,
}
