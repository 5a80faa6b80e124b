//! In-memory object store and run ledger.

use super::{ObjectRef, ObjectStore, RunHandle};
use crate::error::{Result, WeftError};
use crate::types::Fingerprint;
use crate::value::{NodeOutput, Value};
use dashmap::DashMap;

/// Store backed by concurrent hash maps; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<ObjectRef, Value>,
    names: DashMap<String, ObjectRef>,
    runs: DashMap<Fingerprint, RunHandle>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct stored values.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of ledgered runs.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Drop every object, name and run.
    pub fn clear(&self) {
        self.objects.clear();
        self.names.clear();
        self.runs.clear();
    }
}

impl ObjectStore for MemoryStore {
    fn save(&self, value: &Value, name: Option<&str>) -> Result<ObjectRef> {
        let reference = ObjectRef::for_value(value);
        self.objects
            .entry(reference.clone())
            .or_insert_with(|| value.clone());
        if let Some(name) = name {
            self.names.insert(name.to_string(), reference.clone());
        }
        Ok(reference)
    }

    fn get(&self, reference: &ObjectRef) -> Result<Value> {
        self.objects
            .get(reference)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| WeftError::ObjectNotFound {
                reference: reference.to_string(),
            })
    }

    fn get_by_name(&self, name: &str) -> Result<NodeOutput> {
        let reference = self
            .names
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| WeftError::ObjectNotFound {
                reference: name.to_string(),
            })?;
        let value = self.get(&reference)?;
        Ok(NodeOutput::stored(value, reference))
    }

    fn get_run(&self, fingerprint: &Fingerprint) -> Result<Option<RunHandle>> {
        Ok(self.runs.get(fingerprint).map(|entry| entry.value().clone()))
    }

    fn new_run(&self, fingerprint: &Fingerprint, op_name: &str) -> Result<RunHandle> {
        Ok(RunHandle::new(fingerprint.clone(), op_name))
    }

    fn save_run(&self, run: &RunHandle) -> Result<()> {
        self.runs.insert(run.fingerprint().clone(), run.clone());
        tracing::trace!(fingerprint = %run.fingerprint(), state = ?run.state(), "Run saved");
        Ok(())
    }
}
