//! Manifest loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::Path;

/// File name of the project manifest.
pub const MANIFEST_NAME: &str = "kiln.toml";

/// Highest accepted optimization level.
const MAX_OPT_LEVEL: u8 = 3;

/// Loads and validates `kiln.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    load_config_file(&project_dir.join(MANIFEST_NAME))
}

/// Loads and validates a manifest at an explicit path.
pub fn load_config_file(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a manifest from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and value ranges.
///
/// Dependency references are checked later, when the unit graph is built.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::missing("project.name"));
    }
    if config.project.toolchain.is_empty() {
        return Err(ConfigError::missing("project.toolchain"));
    }
    if config.build.cache_dir.is_empty() {
        return Err(ConfigError::invalid("build.cache_dir", "must not be empty"));
    }

    for (name, profile) in &config.profiles {
        if profile.opt_level > MAX_OPT_LEVEL {
            return Err(ConfigError::invalid(
                format!("profiles.{name}.opt_level"),
                format!("must be at most {MAX_OPT_LEVEL}, got {}", profile.opt_level),
            ));
        }
        if profile.features.iter().any(String::is_empty) {
            return Err(ConfigError::invalid(
                format!("profiles.{name}.features"),
                "empty feature name",
            ));
        }
    }

    for (name, unit) in &config.units {
        if name.trim().is_empty() {
            return Err(ConfigError::invalid("units", "empty unit identifier"));
        }
        if unit.sources.is_empty() {
            return Err(ConfigError::missing(format!("units.{name}.sources")));
        }
        if unit.features.iter().any(String::is_empty) {
            return Err(ConfigError::invalid(
                format!("units.{name}.features"),
                "empty feature name",
            ));
        }
        if unit.env.iter().any(|var| var.is_empty() || var.contains('=')) {
            return Err(ConfigError::invalid(
                format!("units.{name}.env"),
                "variable names must be non-empty and must not contain '='",
            ));
        }
        let command = unit.command.as_ref().unwrap_or(&config.build.command);
        if command.is_empty() {
            return Err(ConfigError::missing(format!("units.{name}.command")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[project]
name = "demo"
toolchain = "rustc 1.80.0"

[build]
command = ["make", "{unit}"]

[units.core]
sources = ["core/lib.rs"]
"#;

    #[test]
    fn parse_minimal_config() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.project.name, "demo");
        assert_eq!(config.project.target, "host");
        assert_eq!(config.build.cache_dir, ".kiln");
        assert_eq!(config.build.jobs, 0);
        assert!(config.profiles.is_empty());
        assert_eq!(config.units["core"].sources, vec!["core/lib.rs"]);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "demo"
toolchain = "rustc 1.80.0"
target = "x86_64-unknown-linux-gnu"

[build]
cache_dir = "target/kiln"
jobs = 4
command = ["sh", "-c", "make {unit}"]

[profiles.release]
opt_level = 3
features = ["lto"]

[profiles.bench]
opt_level = 3
debug = true

[units.core]
sources = ["core/lib.rs", "core/util.rs"]
features = ["std"]
env = ["CORE_MODE"]
build_outputs = ["gen/out.rs"]

[units.app]
sources = ["app/main.rs"]
deps = ["core"]
command = ["cargo", "build", "-p", "{unit}"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.build.cache_dir, "target/kiln");
        assert_eq!(config.build.jobs, 4);
        assert_eq!(config.profiles.len(), 2);
        assert!(config.profiles["bench"].debug);
        assert_eq!(config.units["core"].env, vec!["CORE_MODE"]);
        assert_eq!(config.units["core"].build_outputs, vec!["gen/out.rs"]);
        assert_eq!(config.units["app"].deps, vec!["core"]);
        assert_eq!(
            config.units["app"].command.as_deref(),
            Some(&["cargo", "build", "-p", "{unit}"].map(String::from)[..])
        );
    }

    #[test]
    fn missing_toolchain_errors() {
        let toml = r#"
[project]
name = "demo"
toolchain = ""
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "project.toolchain"));
    }

    #[test]
    fn unit_without_sources_errors() {
        let toml = r#"
[project]
name = "demo"
toolchain = "tc"

[build]
command = ["true"]

[units.empty]
deps = []
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { field } if field == "units.empty.sources"
        ));
    }

    #[test]
    fn unit_without_any_command_errors() {
        let toml = r#"
[project]
name = "demo"
toolchain = "tc"

[units.core]
sources = ["lib.rs"]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { field } if field == "units.core.command"
        ));
    }

    #[test]
    fn per_unit_command_satisfies_requirement() {
        let toml = r#"
[project]
name = "demo"
toolchain = "tc"

[units.core]
sources = ["lib.rs"]
command = ["true"]
"#;
        assert!(load_config_from_str(toml).is_ok());
    }

    #[test]
    fn opt_level_out_of_range_errors() {
        let toml = r#"
[project]
name = "demo"
toolchain = "tc"

[profiles.fast]
opt_level = 9
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn invalid_env_name_errors() {
        let toml = r#"
[project]
name = "demo"
toolchain = "tc"

[build]
command = ["true"]

[units.core]
sources = ["lib.rs"]
env = ["A=B"]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_NAME), MINIMAL).unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project.name, "demo");
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
