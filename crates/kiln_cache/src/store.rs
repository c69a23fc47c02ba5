//! The fingerprint store abstraction.

use kiln_common::{ContentHash, ContentHasher, UnitId};
use kiln_graph::Unit;

use crate::error::CacheError;
use crate::fingerprint::Fingerprint;

/// Identifies one fingerprint record: a unit under one configuration variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// The unit's logical name.
    pub unit: UnitId,
    /// Record hash of the unit's configuration descriptor.
    pub variant: ContentHash,
}

impl RecordKey {
    /// Creates a key from its parts.
    pub fn new(unit: UnitId, variant: ContentHash) -> Self {
        Self { unit, variant }
    }

    /// The key under which `unit` is recorded.
    pub fn for_unit(unit: &Unit) -> Self {
        Self::new(unit.id.clone(), unit.config.record_hash())
    }

    /// File name of the record in an on-disk store.
    ///
    /// The suffix hashes the exact unit id with the variant, since distinct
    /// ids can share a sanitized stem.
    pub fn file_name(&self) -> String {
        let suffix = ContentHasher::new("kiln.record-file")
            .write_field(self.unit.as_str().as_bytes())
            .write_hash(&self.variant)
            .finish();
        format!("{}-{}.json", self.unit.file_stem(), suffix.short_hex(16))
    }
}

/// What a store holds for a key.
#[derive(Debug, Clone)]
pub enum StoredRecord {
    /// No record exists.
    Absent,
    /// A record exists but is corrupt, truncated or belongs to another key.
    Unreadable,
    /// A record exists but was written under another schema version.
    Incompatible {
        /// The schema version found in the record.
        found: u32,
    },
    /// A current, well-formed record.
    Valid(Fingerprint),
}

impl StoredRecord {
    /// Returns the fingerprint if the record is valid.
    pub fn into_valid(self) -> Option<Fingerprint> {
        match self {
            Self::Valid(fp) => Some(fp),
            _ => None,
        }
    }
}

/// Which records a clear operation removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    /// Every variant of one unit.
    Unit(UnitId),
    /// The single record stored under a key.
    Record(RecordKey),
    /// Everything in the store.
    All,
}

/// Durable storage for fingerprint records.
///
/// Saves for distinct keys may run concurrently. The orchestrator guarantees
/// that one key is never saved and loaded concurrently within a run.
pub trait FingerprintStore: Send + Sync {
    /// Reports what is stored for `key`. Never fails.
    fn inspect(&self, key: &RecordKey) -> StoredRecord;

    /// Returns the stored fingerprint if it is present, readable and of the
    /// current schema; `None` otherwise.
    fn load(&self, key: &RecordKey) -> Option<Fingerprint> {
        self.inspect(key).into_valid()
    }

    /// Atomically replaces the record for `key`.
    ///
    /// After a crash either the new record or the previous one is visible,
    /// never a partial write.
    fn save(&self, key: &RecordKey, fingerprint: &Fingerprint) -> Result<(), CacheError>;

    /// Removes records and returns how many were removed.
    fn clear(&self, scope: &ClearScope) -> Result<usize, CacheError>;

    /// Keys of all readable records.
    fn keys(&self) -> Result<Vec<RecordKey>, CacheError>;

    /// Removes every record whose key is not in `live` and returns how many
    /// were removed.
    fn prune(&self, live: &[RecordKey]) -> Result<usize, CacheError>;
}
