//! Shared foundational types used across the kiln build cache.
//!
//! This crate provides content hashing, unit identifiers and the
//! configuration descriptor that together define what a unit was built from.

#![warn(missing_docs)]

pub mod descriptor;
pub mod hash;
pub mod unit_id;

pub use descriptor::ConfigDescriptor;
pub use hash::{ContentHash, ContentHasher, ParseHashError};
pub use unit_id::UnitId;
