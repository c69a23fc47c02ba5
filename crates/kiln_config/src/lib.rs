//! Parsing, validation and resolution of `kiln.toml` project manifests.
//!
//! This crate reads the project manifest into a strongly-typed
//! [`ProjectConfig`] and resolves it for one profile into the units the
//! build graph is made of.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, MANIFEST_NAME};
pub use resolve::{resolve_build, resolve_profile, ResolvedBuild, ResolvedProfile, DEFAULT_PROFILE};
pub use types::*;
