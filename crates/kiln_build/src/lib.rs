//! Staleness decisions and parallel build orchestration.
//!
//! The [`InvalidationEngine`] compares each unit's current inputs against its
//! stored fingerprint and propagates staleness along dependency edges. The
//! [`Orchestrator`] walks the graph with a bounded worker pool, hands stale
//! units to a [`Compiler`] and records fingerprints for successful builds.

#![warn(missing_docs)]

pub mod cancel;
pub mod compiler;
pub mod invalidation;
pub mod orchestrator;
pub mod report;
pub mod verdict;

pub use cancel::CancelToken;
pub use compiler::{CompileError, Compiler};
pub use invalidation::{
    Evaluation, InvalidationEngine, Plan, PlanEntry, PlanOutcome, UpstreamState,
};
pub use orchestrator::{BuildOptions, Orchestrator};
pub use report::{BuildReport, UnitOutcome, UnitReport};
pub use verdict::{StaleReason, Verdict};
