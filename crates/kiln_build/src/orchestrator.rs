//! Parallel build orchestration.
//!
//! The coordinating thread owns all scheduling state. Workers receive one
//! unit at a time over a channel, evaluate it, compile it if stale, persist
//! its new fingerprint and send back a completion. A unit is dispatched only
//! once every direct dependency completed successfully; among ready units the
//! one earliest in topological order goes first.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;
use std::sync::{mpsc, Mutex};
use std::time::{Duration, Instant};

use kiln_cache::{ClearScope, FingerprintStore, RecordKey};
use kiln_graph::arena::Arena;
use kiln_graph::{UnitGraph, UnitIndex};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::compiler::{CompileError, Compiler};
use crate::invalidation::{InvalidationEngine, UpstreamState};
use crate::report::{BuildReport, UnitOutcome, UnitReport};
use crate::verdict::Verdict;

/// Options controlling a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Maximum number of concurrent compilations. Values below 1 mean 1.
    pub jobs: usize,
    /// Rebuild every unit regardless of its fingerprint.
    pub force: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            force: false,
        }
    }
}

/// A unit handed to a worker along with its settled dependencies.
struct Job {
    idx: UnitIndex,
    upstream: Vec<UpstreamState>,
}

/// A worker's report for one unit.
struct Completion {
    idx: UnitIndex,
    outcome: UnitOutcome,
    verdict: Option<Verdict>,
    state: Option<UpstreamState>,
    duration: Duration,
}

/// Scheduling state owned by the coordinating thread.
struct Progress {
    /// Direct dependencies not yet completed, per unit.
    remaining: Arena<UnitIndex, usize>,
    /// Settled state of completed units.
    states: Arena<UnitIndex, Option<UpstreamState>>,
    /// Terminal reports.
    results: Arena<UnitIndex, Option<UnitReport>>,
    /// Units whose dependencies have all completed, keyed by topological rank.
    ready: BinaryHeap<Reverse<(usize, UnitIndex)>>,
}

impl Progress {
    fn new(graph: &UnitGraph) -> Self {
        let mut remaining: Arena<UnitIndex, usize> = Arena::filled(graph.len(), 0);
        let mut ready = BinaryHeap::new();
        for (idx, _) in graph.units() {
            remaining[idx] = graph.dependencies(idx).len();
            if remaining[idx] == 0 {
                ready.push(Reverse((graph.rank(idx), idx)));
            }
        }
        Self {
            remaining,
            states: Arena::filled(graph.len(), None),
            results: Arena::filled(graph.len(), None),
            ready,
        }
    }

    fn next_job(&mut self, graph: &UnitGraph) -> Option<Job> {
        let Reverse((_, idx)) = self.ready.pop()?;
        let upstream = graph
            .dependencies(idx)
            .iter()
            .filter_map(|&dep| self.states[dep].clone())
            .collect();
        Some(Job { idx, upstream })
    }

    fn complete(&mut self, graph: &UnitGraph, done: Completion) {
        let idx = done.idx;
        match &done.outcome {
            UnitOutcome::Reused | UnitOutcome::Rebuilt => {
                self.states[idx] = done.state;
                for &dependent in graph.dependents(idx) {
                    self.remaining[dependent] -= 1;
                    if self.remaining[dependent] == 0 {
                        self.ready.push(Reverse((graph.rank(dependent), dependent)));
                    }
                }
            }
            UnitOutcome::Failed { .. } => {
                let by = graph.unit(idx).id.clone();
                for dependent in graph.transitive_dependents(idx) {
                    if self.results[dependent].is_none() {
                        self.results[dependent] = Some(UnitReport {
                            unit: graph.unit(dependent).id.clone(),
                            outcome: UnitOutcome::Blocked { by: by.clone() },
                            verdict: None,
                            duration: Duration::ZERO,
                        });
                    }
                }
            }
            UnitOutcome::Blocked { .. } | UnitOutcome::Cancelled => {}
        }
        self.results[idx] = Some(UnitReport {
            unit: graph.unit(idx).id.clone(),
            outcome: done.outcome,
            verdict: done.verdict,
            duration: done.duration,
        });
    }

    fn into_reports(mut self, graph: &UnitGraph) -> Vec<UnitReport> {
        graph
            .topo_order()
            .iter()
            .map(|&idx| {
                self.results[idx].take().unwrap_or_else(|| UnitReport {
                    unit: graph.unit(idx).id.clone(),
                    outcome: UnitOutcome::Cancelled,
                    verdict: None,
                    duration: Duration::ZERO,
                })
            })
            .collect()
    }
}

/// Drives an incremental build over a unit graph.
pub struct Orchestrator<'a> {
    engine: InvalidationEngine<'a>,
    compiler: &'a dyn Compiler,
    options: BuildOptions,
    cancel: CancelToken,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator with default options and a fresh cancel token.
    pub fn new(
        graph: &'a UnitGraph,
        store: &'a dyn FingerprintStore,
        compiler: &'a dyn Compiler,
        root: &Path,
    ) -> Self {
        Self {
            engine: InvalidationEngine::new(graph, store, root),
            compiler,
            options: BuildOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Sets build options.
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.engine = self.engine.with_force(options.force);
        self.options = options;
        self
    }

    /// Uses `cancel` to stop the build.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the token that cancels this build.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Builds every unit of the graph.
    ///
    /// Never fails as a whole: per-unit failures are reported in the
    /// returned [`BuildReport`] and unrelated units still complete.
    pub fn run(&self) -> BuildReport {
        let graph = self.engine.graph();
        let start = Instant::now();
        let mut progress = Progress::new(graph);
        let workers = self.options.jobs.clamp(1, graph.len().max(1));

        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (done_tx, done_rx) = mpsc::channel::<Completion>();
        let job_rx = Mutex::new(job_rx);

        std::thread::scope(|s| {
            for _ in 0..workers {
                let done_tx = done_tx.clone();
                let job_rx = &job_rx;
                s.spawn(move || loop {
                    let job = {
                        let Ok(rx) = job_rx.lock() else { break };
                        match rx.recv() {
                            Ok(job) => job,
                            Err(_) => break,
                        }
                    };
                    if done_tx.send(self.execute(job)).is_err() {
                        break;
                    }
                });
            }
            // Workers hold the remaining senders.
            drop(done_tx);

            let mut in_flight = 0usize;
            loop {
                while in_flight < workers && !self.cancel.is_cancelled() {
                    let Some(job) = progress.next_job(graph) else {
                        break;
                    };
                    if job_tx.send(job).is_err() {
                        break;
                    }
                    in_flight += 1;
                }
                if in_flight == 0 {
                    break;
                }
                let Ok(done) = done_rx.recv() else {
                    break;
                };
                in_flight -= 1;
                progress.complete(graph, done);
            }
            drop(job_tx);
        });

        let units = progress.into_reports(graph);
        self.discard_unfinished(&units);
        let report = BuildReport {
            units,
            elapsed: start.elapsed(),
            cancelled: self.cancel.is_cancelled(),
        };
        info!(
            rebuilt = report.count("rebuilt"),
            reused = report.count("reused"),
            failed = report.count("failed"),
            blocked = report.count("blocked"),
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "build finished"
        );
        report
    }

    /// Removes the records of units that did not finish but had a dependency
    /// rebuilt in this run.
    ///
    /// A dependency rebuilt with an unchanged hash leaves such a record
    /// matching the next evaluation, although the unit never compiled against
    /// the new dependency output.
    fn discard_unfinished(&self, units: &[UnitReport]) {
        let graph = self.engine.graph();
        let mut rebuilt: Arena<UnitIndex, bool> = Arena::filled(graph.len(), false);
        for (&idx, report) in graph.topo_order().iter().zip(units) {
            match report.outcome {
                UnitOutcome::Rebuilt => rebuilt[idx] = true,
                UnitOutcome::Reused => {}
                _ if graph.dependencies(idx).iter().any(|&dep| rebuilt[dep]) => {
                    let key = RecordKey::for_unit(graph.unit(idx));
                    match self.engine.store().clear(&ClearScope::Record(key)) {
                        Ok(0) => {}
                        Ok(_) => debug!(unit = %report.unit, "discarded stale fingerprint"),
                        Err(err) => {
                            warn!(unit = %report.unit, error = %err, "cannot discard fingerprint");
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Evaluates one unit and compiles it if stale. Runs on a worker thread.
    fn execute(&self, job: Job) -> Completion {
        let start = Instant::now();
        let unit = self.engine.graph().unit(job.idx);
        let finish = |outcome, verdict, state| Completion {
            idx: job.idx,
            outcome,
            verdict,
            state,
            duration: start.elapsed(),
        };

        let eval = match self.engine.evaluate(job.idx, &job.upstream) {
            Ok(eval) => eval,
            Err(err) => {
                warn!(unit = %unit.id, error = %err, "cannot hash unit inputs");
                return finish(
                    UnitOutcome::Failed {
                        error: err.to_string(),
                    },
                    None,
                    None,
                );
            }
        };

        let verdict = Some(eval.verdict);
        let reason = match eval.verdict {
            Verdict::Fresh => return finish(UnitOutcome::Reused, verdict, Some(eval.upstream())),
            Verdict::Stale(reason) => reason,
        };
        if self.cancel.is_cancelled() {
            return finish(UnitOutcome::Cancelled, verdict, None);
        }

        info!(unit = %unit.id, %reason, "compiling");
        match self.compiler.compile(unit, &self.cancel) {
            Ok(()) => {
                let key = eval.current.key();
                match self.engine.store().save(&key, &eval.current) {
                    Ok(()) => debug!(unit = %unit.id, "fingerprint recorded"),
                    Err(err) => {
                        warn!(unit = %unit.id, error = %err, "cannot record fingerprint");
                    }
                }
                finish(UnitOutcome::Rebuilt, verdict, Some(eval.upstream()))
            }
            Err(CompileError::Cancelled) => finish(UnitOutcome::Cancelled, verdict, None),
            Err(CompileError::Failed { message }) => {
                warn!(unit = %unit.id, error = %message, "compilation failed");
                finish(UnitOutcome::Failed { error: message }, verdict, None)
            }
        }
    }
}
