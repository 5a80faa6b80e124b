//! Request-scoped execution state.

use crate::fanout::{ParallelBudget, ThreadGauge};
use crate::memo::MemoCache;
use crate::stats::{Diagnostic, ExecutionStats};
use std::collections::HashMap;
use std::sync::Arc;
use weft_core::types::NodeId;
use weft_core::value::NodeOutput;

/// Everything one top-level request threads through compile and execution.
///
/// Passed down by `&mut`. Fan-out workers get a [`fork`](Self::fork) that
/// carries copies of the result store and memo, and the parent
/// [`absorb`](Self::absorb)s it after the join.
#[derive(Debug)]
pub(crate) struct ExecutionScope {
    /// Set for the duration of the top-level compile; nested compiles are
    /// passthroughs while it is set.
    pub(crate) compiling: bool,
    /// Skip ledger lookups for this request.
    pub(crate) no_cache: bool,
    /// Results by node identity, shared across nested scheduler runs.
    pub(crate) results: HashMap<NodeId, NodeOutput>,
    pub(crate) memo: MemoCache,
    pub(crate) stats: ExecutionStats,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) budget: ParallelBudget,
    pub(crate) gauge: Arc<ThreadGauge>,
}

impl ExecutionScope {
    pub(crate) fn new(budget: ParallelBudget, no_cache: bool) -> Self {
        Self {
            compiling: false,
            no_cache,
            results: HashMap::new(),
            memo: MemoCache::new(),
            stats: ExecutionStats::default(),
            diagnostics: Vec::new(),
            budget,
            gauge: Arc::new(ThreadGauge::new()),
        }
    }

    /// Child scope for a fan-out worker.
    pub(crate) fn fork(&self, budget: ParallelBudget) -> Self {
        Self {
            compiling: self.compiling,
            no_cache: self.no_cache,
            results: self.results.clone(),
            memo: self.memo.clone(),
            stats: ExecutionStats::default(),
            diagnostics: Vec::new(),
            budget,
            gauge: Arc::clone(&self.gauge),
        }
    }

    /// Merge a joined worker's scope back.
    pub(crate) fn absorb(&mut self, child: ExecutionScope) {
        self.results.extend(child.results);
        self.memo.absorb(child.memo);
        self.stats.merge(child.stats);
        self.diagnostics.extend(child.diagnostics);
    }

    /// Close the request: stamp the thread peak into the statistics.
    pub(crate) fn finish(&mut self) {
        self.stats.peak_fanout_threads = self.stats.peak_fanout_threads.max(self.gauge.peak());
    }
}
