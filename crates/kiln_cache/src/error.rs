//! Errors from hashing inputs and writing fingerprint records.

use std::path::PathBuf;

use kiln_common::UnitId;

/// Hashing and store-mutation failures.
///
/// Reads of fingerprint records never produce these: a missing, corrupt or
/// version-mismatched record is a cache miss. Errors come from hashing unit
/// inputs and from writing or clearing records.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The store directory or one of its records could not be written,
    /// listed or removed.
    #[error("fingerprint store error at {path}: {source}")]
    Io {
        /// Record or directory path.
        path: PathBuf,
        /// Cause.
        source: std::io::Error,
    },

    /// A declared input of a unit could not be read.
    #[error("unit '{unit}': cannot read input {path}: {source}")]
    UnreadableInput {
        /// Declaring unit.
        unit: UnitId,
        /// Path as declared, relative to the project root.
        path: PathBuf,
        /// Cause.
        source: std::io::Error,
    },

    /// A record or configuration descriptor could not be encoded.
    #[error("cannot encode {what}: {reason}")]
    Encode {
        /// What was being encoded.
        what: &'static str,
        /// Encoder message.
        reason: String,
    },
}

impl CacheError {
    /// Returns `true` for errors caused by a unit's own declared inputs.
    pub fn is_unreadable_input(&self) -> bool {
        matches!(self, Self::UnreadableInput { .. })
    }
}
