//! In-process fingerprint store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::CacheError;
use crate::fingerprint::{validate, Fingerprint};
use crate::store::{ClearScope, FingerprintStore, RecordKey, StoredRecord};

/// A [`FingerprintStore`] that keeps records in memory.
///
/// Used by tests and by callers that want incremental decisions without
/// touching the file system. Records do not outlive the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<RecordKey, Fingerprint>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `fingerprint` under `key` without counting it as a save.
    pub fn insert(&self, key: RecordKey, fingerprint: Fingerprint) {
        self.records().insert(key, fingerprint);
    }

    /// Returns the number of records held.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Returns the number of successful [`FingerprintStore::save`] calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn records(&self) -> MutexGuard<'_, HashMap<RecordKey, Fingerprint>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FingerprintStore for MemoryStore {
    fn inspect(&self, key: &RecordKey) -> StoredRecord {
        match self.records().get(key) {
            Some(fp) => validate(fp.clone(), key),
            None => StoredRecord::Absent,
        }
    }

    fn save(&self, key: &RecordKey, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        self.records().insert(key.clone(), fingerprint.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self, scope: &ClearScope) -> Result<usize, CacheError> {
        let mut records = self.records();
        let before = records.len();
        match scope {
            ClearScope::Unit(unit) => records.retain(|key, _| key.unit != *unit),
            ClearScope::Record(key) => {
                records.remove(key);
            }
            ClearScope::All => records.clear(),
        }
        Ok(before - records.len())
    }

    fn keys(&self) -> Result<Vec<RecordKey>, CacheError> {
        let mut keys: Vec<RecordKey> = self.records().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn prune(&self, live: &[RecordKey]) -> Result<usize, CacheError> {
        let live: HashSet<&RecordKey> = live.iter().collect();
        let mut records = self.records();
        let before = records.len();
        records.retain(|key, _| live.contains(key));
        Ok(before - records.len())
    }
}
