//! Fingerprint records stored as JSON files in a directory.
//!
//! Each record lives at `<dir>/<unit>-<key hash>.json`. Saves write a temporary
//! file in the same directory, sync it, then rename it over the record, so a
//! crash leaves either the previous record or the new one.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use kiln_common::UnitId;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::fingerprint::{decode_record, encode_record, Fingerprint};
use crate::store::{ClearScope, FingerprintStore, RecordKey, StoredRecord};

/// File extension of fingerprint records.
const RECORD_EXT: &str = "json";

/// Prefix of in-progress writes. Leftovers from a crashed run are ignored by
/// reads and removed by [`FingerprintStore::prune`] and [`ClearScope::All`].
const TEMP_PREFIX: &str = ".record-";

/// A [`FingerprintStore`] backed by one directory of JSON records.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Creates the store for one profile: `<cache_dir>/<profile>/fingerprints`.
    pub fn for_profile(cache_dir: &Path, profile: &str) -> Self {
        Self::new(&cache_dir.join(profile).join("fingerprints"))
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path of the record for `key`.
    pub fn record_path(&self, key: &RecordKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
        move |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Lists record files and leftover temporary files in the store directory.
    fn entries(&self) -> Result<Vec<(PathBuf, EntryKind)>, CacheError> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(&self.dir)(e)),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(Self::io_error(&self.dir))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let kind = if name.starts_with(TEMP_PREFIX) {
                EntryKind::Temp
            } else if path.extension().is_some_and(|ext| ext == RECORD_EXT) {
                EntryKind::Record
            } else {
                continue;
            };
            entries.push((path, kind));
        }
        entries.sort();
        Ok(entries)
    }

    fn remove(path: &Path) -> Result<bool, CacheError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(path)(e)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EntryKind {
    Record,
    Temp,
}

/// Returns the unit stem of a record file name (`<stem>-<key hash>.json`).
fn record_stem(path: &Path) -> Option<&str> {
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit_once('-').map(|(unit, _)| unit)
}

/// Whether the record at `path` was written for `unit`.
///
/// Distinct ids can share a file stem (`net/http` and `net_http`), so the
/// stem only preselects; the decoded unit decides. A record that no longer
/// decodes counts as its stem's.
fn record_belongs_to(path: &Path, unit: &UnitId) -> bool {
    if record_stem(path) != Some(unit.file_stem().as_str()) {
        return false;
    }
    let Ok(raw) = std::fs::read(path) else {
        return true;
    };
    match serde_json::from_slice::<RecordUnit>(&raw) {
        Ok(record) => record.unit == *unit,
        Err(_) => true,
    }
}

/// The unit field of a record, read without the rest.
#[derive(Deserialize)]
struct RecordUnit {
    unit: UnitId,
}

impl FingerprintStore for DiskStore {
    fn inspect(&self, key: &RecordKey) -> StoredRecord {
        let path = self.record_path(key);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoredRecord::Absent,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read fingerprint record");
                return StoredRecord::Unreadable;
            }
        };

        let record = decode_record(&raw, key);
        match &record {
            StoredRecord::Unreadable => {
                warn!(
                    unit = %key.unit,
                    path = %path.display(),
                    "discarding unreadable fingerprint record"
                );
            }
            StoredRecord::Incompatible { found } => {
                debug!(unit = %key.unit, found, "fingerprint record has another schema version");
            }
            _ => {}
        }
        record
    }

    fn save(&self, key: &RecordKey, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(Self::io_error(&self.dir))?;
        let bytes = encode_record(fingerprint)?;
        let path = self.record_path(key);

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(Self::io_error(&self.dir))?;
        tmp.write_all(&bytes).map_err(Self::io_error(tmp.path()))?;
        tmp.as_file().sync_all().map_err(Self::io_error(tmp.path()))?;
        tmp.persist(&path).map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e.error,
        })?;

        debug!(unit = %key.unit, path = %path.display(), "saved fingerprint");
        Ok(())
    }

    fn clear(&self, scope: &ClearScope) -> Result<usize, CacheError> {
        let unit = match scope {
            ClearScope::Record(key) => {
                return Ok(usize::from(Self::remove(&self.record_path(key))?));
            }
            ClearScope::Unit(unit) => Some(unit),
            ClearScope::All => None,
        };

        let mut removed = 0;
        for (path, kind) in self.entries()? {
            let matches = match (unit, kind) {
                (None, _) => true,
                (Some(unit), EntryKind::Record) => record_belongs_to(&path, unit),
                (Some(_), EntryKind::Temp) => false,
            };
            if matches && Self::remove(&path)? && kind == EntryKind::Record {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn keys(&self) -> Result<Vec<RecordKey>, CacheError> {
        let mut keys = Vec::new();
        for (path, kind) in self.entries()? {
            if kind != EntryKind::Record {
                continue;
            }
            let Ok(raw) = std::fs::read(&path) else {
                continue;
            };
            let Ok(fp) = serde_json::from_slice::<Fingerprint>(&raw) else {
                continue;
            };
            let key = fp.key();
            // A record copied under another name does not count.
            if path.file_name().and_then(|n| n.to_str()) == Some(key.file_name().as_str()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn prune(&self, live: &[RecordKey]) -> Result<usize, CacheError> {
        let live: HashSet<String> = live.iter().map(RecordKey::file_name).collect();
        let mut removed = 0;
        for (path, kind) in self.entries()? {
            let keep = kind == EntryKind::Record
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| live.contains(n));
            if !keep && Self::remove(&path)? && kind == EntryKind::Record {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
