//! Dependency graph over compilable units.
//!
//! A [`UnitGraph`] is built from a list of [`Unit`]s with declared dependency
//! identifiers. Construction fails on unknown dependencies, duplicate units and
//! cycles, so every graph that exists is a valid DAG with a deterministic
//! topological order.

#![warn(missing_docs)]

pub mod arena;
pub mod error;
pub mod graph;
pub mod ids;
pub mod unit;

pub use error::GraphError;
pub use graph::UnitGraph;
pub use ids::UnitIndex;
pub use unit::Unit;
