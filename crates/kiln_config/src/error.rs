//! Manifest errors.

use std::path::PathBuf;

/// Errors from loading, validating or resolving a `kiln.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The manifest file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Manifest path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest is not valid TOML or has fields of the wrong type.
    #[error("invalid manifest: {0}")]
    Parse(String),

    /// A selected profile is neither built in nor declared.
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    /// A required key is absent or empty.
    #[error("missing required field `{field}`")]
    MissingField {
        /// Dotted key path, e.g. `units.core.sources`.
        field: String,
    },

    /// A key is present but its value is not acceptable.
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        /// Dotted key path.
        field: String,
        /// What is wrong with the value.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
