//! Unit input hashing and change detection.
//!
//! Computes the local hash of a unit from the contents of its declared inputs
//! and its configuration descriptor, and compares per-file hashes against a
//! prior fingerprint to explain which files changed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_common::{ContentHash, ContentHasher};
use kiln_graph::Unit;
use rayon::prelude::*;

use crate::error::CacheError;

/// The hashed inputs of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDigest {
    /// Digest of all tracked inputs and the configuration descriptor.
    pub local: ContentHash,
    /// Content hash of each declared input, keyed by its declared path.
    pub files: BTreeMap<PathBuf, ContentHash>,
}

/// Result of comparing current input hashes against a prior fingerprint.
///
/// Categorizes all files into new (never seen), modified (hash changed),
/// deleted (in the prior record but no longer declared), and unchanged.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Inputs that are not present in the prior record.
    pub new_files: Vec<PathBuf>,

    /// Inputs whose content hash differs from the prior record.
    pub modified_files: Vec<PathBuf>,

    /// Inputs present in the prior record but not declared any more.
    pub deleted_files: Vec<PathBuf>,

    /// Inputs whose content hash matches the prior record.
    pub unchanged_files: Vec<PathBuf>,
}

impl ChangeSet {
    /// Returns `true` if there are no changes (no new, modified, or deleted files).
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty() && self.modified_files.is_empty() && self.deleted_files.is_empty()
    }

    /// Returns the number of inputs that are new or modified.
    pub fn dirty_count(&self) -> usize {
        self.new_files.len() + self.modified_files.len()
    }
}

/// Computes content hashes of unit inputs relative to a project root.
///
/// Only file contents are hashed. Paths, modification times and path case
/// never reach the digest, so it is stable across checkouts and copies.
#[derive(Debug, Clone)]
pub struct SourceHasher {
    root: PathBuf,
}

impl SourceHasher {
    /// Creates a hasher resolving declared paths against `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Returns the project root declared paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Computes the content hash of a single file.
    pub fn hash_file(path: &Path) -> std::io::Result<ContentHash> {
        let content = std::fs::read(path)?;
        Ok(ContentHash::from_bytes(&content))
    }

    /// Hashes every declared input of `unit` and combines them with the
    /// canonical encoding of its configuration descriptor.
    ///
    /// Files are read in parallel but combined in declared order: sources
    /// first, then build-script outputs.
    pub fn digest_unit(&self, unit: &Unit) -> Result<InputDigest, CacheError> {
        let inputs: Vec<&PathBuf> = unit.sources.iter().chain(&unit.build_outputs).collect();
        let hashes = inputs
            .par_iter()
            .map(|path| {
                Self::hash_file(&self.root.join(path)).map_err(|source| {
                    CacheError::UnreadableInput {
                        unit: unit.id.clone(),
                        path: (*path).clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<ContentHash>, CacheError>>()?;

        let config = unit
            .config
            .canonical_bytes()
            .map_err(|e| CacheError::Encode {
                what: "configuration descriptor",
                reason: e.to_string(),
            })?;

        let mut hasher = ContentHasher::new("kiln.local");
        hasher.write_field(&config);
        let (sources, outputs) = hashes.split_at(unit.sources.len());
        hasher.write_field(&(sources.len() as u64).to_le_bytes());
        for hash in sources {
            hasher.write_hash(hash);
        }
        hasher.write_field(&(outputs.len() as u64).to_le_bytes());
        for hash in outputs {
            hasher.write_hash(hash);
        }

        let files = inputs
            .into_iter()
            .cloned()
            .zip(hashes.iter().copied())
            .collect();

        Ok(InputDigest {
            local: hasher.finish(),
            files,
        })
    }

    /// Compares current input hashes against those recorded in a prior build.
    pub fn detect_changes(
        current: &InputDigest,
        prior_files: &BTreeMap<PathBuf, ContentHash>,
    ) -> ChangeSet {
        let mut changes = ChangeSet::default();

        for (path, hash) in &current.files {
            match prior_files.get(path) {
                Some(prior) if prior == hash => changes.unchanged_files.push(path.clone()),
                Some(_) => changes.modified_files.push(path.clone()),
                None => changes.new_files.push(path.clone()),
            }
        }

        changes.deleted_files = prior_files
            .keys()
            .filter(|p| !current.files.contains_key(*p))
            .cloned()
            .collect();

        changes
    }
}
