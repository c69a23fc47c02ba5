//! Content hashing and fingerprint storage for incremental builds.
//!
//! This crate computes the local hash of a unit from the contents of its
//! declared inputs and its configuration, and persists per-unit fingerprint
//! records so that later runs can tell which units are still fresh.
//!
//! Reads are fail-safe: a missing, corrupt or foreign-schema record is a
//! cache miss, never an error.

#![warn(missing_docs)]

pub mod disk;
pub mod error;
pub mod fingerprint;
pub mod hasher;
pub mod memory;
pub mod store;

pub use disk::DiskStore;
pub use error::CacheError;
pub use fingerprint::{Fingerprint, PRODUCER, SCHEMA_VERSION};
pub use hasher::{ChangeSet, InputDigest, SourceHasher};
pub use memory::MemoryStore;
pub use store::{ClearScope, FingerprintStore, RecordKey, StoredRecord};
