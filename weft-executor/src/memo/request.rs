//! Request-scoped memo of pure op results.

use std::collections::HashMap;
use weft_core::types::Fingerprint;
use weft_core::value::NodeOutput;

/// Raw resolver outputs of pure ops, keyed by fingerprint.
///
/// Outputs are stored before tag flow is applied, so a hit must re-attach
/// the current first-argument tags just like a ledger hit.
#[derive(Debug, Clone, Default)]
pub struct MemoCache {
    entries: HashMap<Fingerprint, NodeOutput>,
}

impl MemoCache {
    /// Create an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Memoized output for a fingerprint.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&NodeOutput> {
        self.entries.get(fingerprint)
    }

    /// Memoize an output.
    pub fn insert(&mut self, fingerprint: Fingerprint, output: NodeOutput) {
        self.entries.insert(fingerprint, output);
    }

    /// Number of memoized outputs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is memoized.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take over every entry of a worker's memo.
    pub fn absorb(&mut self, other: MemoCache) {
        self.entries.extend(other.entries);
    }
}
