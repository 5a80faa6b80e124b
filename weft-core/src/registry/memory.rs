//! In-memory operation registry.

use super::op_def::OpDef;
use super::OpRegistry;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Registry backed by an insertion-ordered map.
///
/// Candidates for a common name are returned in registration order; when
/// two candidates are equally specific the earlier one wins dispatch.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    ops: RwLock<IndexMap<String, Arc<OpDef>>>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an op, replacing any previous definition with the same name.
    pub fn register(&self, def: OpDef) -> Arc<OpDef> {
        let def = Arc::new(def);
        let previous = self
            .ops
            .write()
            .insert(def.name().to_string(), Arc::clone(&def));
        if previous.is_some() {
            tracing::debug!(op = %def.name(), "Replaced op definition");
        }
        def
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(self, def: OpDef) -> Self {
        self.register(def);
        self
    }

    /// Number of registered ops.
    pub fn len(&self) -> usize {
        self.ops.read().len()
    }

    /// Whether no ops are registered.
    pub fn is_empty(&self) -> bool {
        self.ops.read().is_empty()
    }
}

impl OpRegistry for MemoryRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<OpDef>> {
        self.ops.read().get(name).cloned()
    }

    fn find_candidates(&self, common_name: &str) -> Vec<Arc<OpDef>> {
        self.ops
            .read()
            .values()
            .filter(|def| def.dispatch_name() == common_name)
            .cloned()
            .collect()
    }
}
