//! Fingerprint records: what a unit was last successfully built from.
//!
//! A record is a JSON object whose first field is `schema_version`. Readers
//! probe that field before decoding the rest, so records written by a
//! different schema are recognised without being understood.

use std::collections::BTreeMap;
use std::path::PathBuf;

use kiln_common::{ConfigDescriptor, ContentHash, ContentHasher, UnitId};
use kiln_graph::Unit;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::hasher::InputDigest;
use crate::store::{RecordKey, StoredRecord};

/// Current fingerprint schema version. Increment on any change to the record
/// layout or to how local or fingerprint hashes are computed.
pub const SCHEMA_VERSION: u32 = 1;

/// Identifies the program that wrote a record.
pub const PRODUCER: &str = concat!("kiln ", env!("CARGO_PKG_VERSION"));

/// The persisted record of a unit's last successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Record schema version. Must stay the first field.
    pub schema_version: u32,

    /// Program and version that wrote the record.
    pub producer: String,

    /// The unit this record belongs to.
    pub unit: UnitId,

    /// Configuration the unit was built under.
    pub config: ConfigDescriptor,

    /// Digest of the unit's own inputs.
    pub local_hash: ContentHash,

    /// Fingerprint hash of each direct dependency at build time.
    pub dep_hashes: BTreeMap<UnitId, ContentHash>,

    /// Per-input content hashes. Only used to explain changes.
    #[serde(default)]
    pub files: BTreeMap<PathBuf, ContentHash>,
}

impl Fingerprint {
    /// Creates a current-schema fingerprint for `unit` from its input digest
    /// and the current fingerprint hashes of its direct dependencies.
    pub fn new(
        unit: &Unit,
        digest: InputDigest,
        dep_hashes: BTreeMap<UnitId, ContentHash>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            producer: PRODUCER.to_string(),
            unit: unit.id.clone(),
            config: unit.config.clone(),
            local_hash: digest.local,
            dep_hashes,
            files: digest.files,
        }
    }

    /// The fingerprint hash: what dependents record for this unit.
    ///
    /// Covers the local hash and every dependency hash, so a change anywhere
    /// upstream changes it.
    pub fn digest(&self) -> ContentHash {
        let mut hasher = ContentHasher::new("kiln.fingerprint");
        hasher.write_hash(&self.local_hash);
        for (dep, hash) in &self.dep_hashes {
            hasher.write_field(dep.as_str().as_bytes()).write_hash(hash);
        }
        hasher.finish()
    }

    /// The store key this fingerprint is saved under.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.unit.clone(), self.config.record_hash())
    }
}

#[derive(Deserialize)]
struct SchemaProbe {
    schema_version: u32,
}

/// Serializes a fingerprint as a pretty-printed JSON record.
pub fn encode_record(fingerprint: &Fingerprint) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec_pretty(fingerprint).map_err(|e| CacheError::Encode {
        what: "fingerprint record",
        reason: e.to_string(),
    })
}

/// Decodes a raw record and validates it against `key`.
///
/// Never fails: anything that is not a current-schema record for `key` is
/// reported as [`StoredRecord::Unreadable`] or [`StoredRecord::Incompatible`].
pub fn decode_record(raw: &[u8], key: &RecordKey) -> StoredRecord {
    let Ok(probe) = serde_json::from_slice::<SchemaProbe>(raw) else {
        return StoredRecord::Unreadable;
    };
    if probe.schema_version != SCHEMA_VERSION {
        return StoredRecord::Incompatible {
            found: probe.schema_version,
        };
    }
    match serde_json::from_slice::<Fingerprint>(raw) {
        Ok(fp) => validate(fp, key),
        Err(_) => StoredRecord::Unreadable,
    }
}

/// Checks that a decoded fingerprint belongs to `key` and has the current
/// schema.
pub(crate) fn validate(fingerprint: Fingerprint, key: &RecordKey) -> StoredRecord {
    if fingerprint.schema_version != SCHEMA_VERSION {
        return StoredRecord::Incompatible {
            found: fingerprint.schema_version,
        };
    }
    if fingerprint.key() != *key {
        return StoredRecord::Unreadable;
    }
    StoredRecord::Valid(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Fingerprint {
        let unit = Unit::new("core", ConfigDescriptor::new("tc", "host", "dev"));
        let digest = InputDigest {
            local: ContentHash::from_bytes(b"local"),
            files: BTreeMap::from([(PathBuf::from("lib.rs"), ContentHash::from_bytes(b"lib"))]),
        };
        let deps = BTreeMap::from([(UnitId::new("base"), ContentHash::from_bytes(b"base"))]);
        Fingerprint::new(&unit, digest, deps)
    }

    #[test]
    fn schema_version_is_first_field() {
        let json = String::from_utf8(encode_record(&sample()).unwrap()).unwrap();
        let first_key = json.trim_start_matches(['{', '\n', ' ']);
        assert!(first_key.starts_with("\"schema_version\""), "{json}");
    }

    #[test]
    fn decode_valid_record() {
        let fp = sample();
        let raw = encode_record(&fp).unwrap();
        match decode_record(&raw, &fp.key()) {
            StoredRecord::Valid(back) => assert_eq!(back, fp),
            other => panic!("expected valid record, got {other:?}"),
        }
    }

    #[test]
    fn decode_garbage_is_unreadable() {
        let key = sample().key();
        assert!(matches!(
            decode_record(b"not json {{{", &key),
            StoredRecord::Unreadable
        ));
    }

    #[test]
    fn decode_future_schema_without_parsing_rest() {
        let key = sample().key();
        let raw = br#"{"schema_version": 99, "layout": ["entirely", "different"]}"#;
        assert!(matches!(
            decode_record(raw, &key),
            StoredRecord::Incompatible { found: 99 }
        ));
    }

    #[test]
    fn decode_truncated_record_is_unreadable() {
        let fp = sample();
        let raw = encode_record(&fp).unwrap();
        let truncated = &raw[..raw.len() / 2];
        assert!(matches!(
            decode_record(truncated, &fp.key()),
            StoredRecord::Unreadable
        ));
    }

    #[test]
    fn decode_record_for_other_unit_is_unreadable() {
        let fp = sample();
        let raw = encode_record(&fp).unwrap();
        let other = RecordKey::new(UnitId::new("other"), fp.config.record_hash());
        assert!(matches!(decode_record(&raw, &other), StoredRecord::Unreadable));
    }

    #[test]
    fn digest_tracks_dependency_hashes() {
        let a = sample();
        let mut b = sample();
        b.dep_hashes
            .insert(UnitId::new("base"), ContentHash::from_bytes(b"base v2"));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn digest_ignores_file_map() {
        let a = sample();
        let mut b = sample();
        b.files.clear();
        assert_eq!(a.digest(), b.digest());
    }
}
