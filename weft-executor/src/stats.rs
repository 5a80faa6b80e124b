//! Execution statistics and strict-mode diagnostics.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use weft_core::types::NodeId;

/// Counters for one op.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpStats {
    /// Resolver invocations.
    pub invocations: u64,
    /// Results served from the run ledger or the request memo.
    pub cache_hits: u64,
    /// Cumulative resolver time.
    pub total_time: Duration,
}

/// Summary of one top-level `execute` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionStats {
    /// Per-op counters, keyed by canonical op name.
    pub ops: BTreeMap<String, OpStats>,
    /// Output nodes evaluated, including cache hits.
    pub nodes_executed: u64,
    /// Scheduler waves run.
    pub waves: u64,
    /// Fan-out maps evaluated on the direct fast path.
    pub fast_path_maps: u64,
    /// Fan-out maps that fell back to per-element scheduling.
    pub fallback_maps: u64,
    /// Most fan-out threads live at once, counting the request thread.
    pub peak_fanout_threads: usize,
    /// Wall time of the request.
    pub elapsed: Duration,
}

impl ExecutionStats {
    /// Record one resolver invocation.
    pub fn record_invocation(&mut self, op: &str, elapsed: Duration) {
        let entry = self.ops.entry(op.to_string()).or_default();
        entry.invocations += 1;
        entry.total_time += elapsed;
    }

    /// Record one cache hit.
    pub fn record_cache_hit(&mut self, op: &str) {
        self.ops.entry(op.to_string()).or_default().cache_hits += 1;
    }

    /// Counters for `op`.
    pub fn op(&self, op: &str) -> Option<&OpStats> {
        self.ops.get(op)
    }

    /// Invocations of `op`, zero when it never ran.
    pub fn invocations(&self, op: &str) -> u64 {
        self.op(op).map_or(0, |s| s.invocations)
    }

    /// Cache hits of `op`, zero when it never hit.
    pub fn cache_hits(&self, op: &str) -> u64 {
        self.op(op).map_or(0, |s| s.cache_hits)
    }

    /// Invocations across all ops.
    pub fn total_invocations(&self) -> u64 {
        self.ops.values().map(|s| s.invocations).sum()
    }

    /// Cache hits across all ops.
    pub fn total_cache_hits(&self) -> u64 {
        self.ops.values().map(|s| s.cache_hits).sum()
    }

    /// Fold a fan-out worker's statistics into these.
    pub fn merge(&mut self, other: ExecutionStats) {
        for (op, stats) in other.ops {
            let entry = self.ops.entry(op).or_default();
            entry.invocations += stats.invocations;
            entry.cache_hits += stats.cache_hits;
            entry.total_time += stats.total_time;
        }
        self.nodes_executed += other.nodes_executed;
        self.waves += other.waves;
        self.fast_path_maps += other.fast_path_maps;
        self.fallback_maps += other.fallback_maps;
        self.peak_fanout_threads = self.peak_fanout_threads.max(other.peak_fanout_threads);
    }
}

/// Where a strict-mode type mismatch was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Declared type vs. the type dispatch derived.
    Dispatch,
    /// Declared type vs. the refined type.
    Refinement,
    /// Declared type vs. the type of the computed value.
    Result,
    /// Dispatch fell back to an exact name whose signature rejects the inputs.
    Signature,
}

/// A recorded type mismatch; execution is not affected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Where the mismatch was found.
    pub kind: DiagnosticKind,
    /// Op name.
    pub op: String,
    /// Node the mismatch concerns.
    pub node: NodeId,
    /// Expected type.
    pub expected: String,
    /// Actual type.
    pub actual: String,
}
