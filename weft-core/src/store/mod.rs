//! Content-addressed object store and run ledger.

mod memory;
mod object_ref;
mod run;

pub use memory::MemoryStore;
pub use object_ref::ObjectRef;
pub use run::{Run, RunHandle, RunState};

use crate::error::Result;
use crate::types::Fingerprint;
use crate::value::{NodeOutput, Value};

/// Persistence interface for values and run records.
///
/// Implementations must be safe to share across the scheduler thread, fan-out
/// workers and background workers.
pub trait ObjectStore: Send + Sync {
    /// Persist a value, optionally aliasing it under `name`.
    fn save(&self, value: &Value, name: Option<&str>) -> Result<ObjectRef>;

    /// Materialize a persisted value.
    fn get(&self, reference: &ObjectRef) -> Result<Value>;

    /// Materialize the value saved under `name`, with its reference.
    fn get_by_name(&self, name: &str) -> Result<NodeOutput>;

    /// Ledgered run for a fingerprint, if any.
    fn get_run(&self, fingerprint: &Fingerprint) -> Result<Option<RunHandle>>;

    /// Create a run record in state `Running`; it is ledgered by `save_run`.
    fn new_run(&self, fingerprint: &Fingerprint, op_name: &str) -> Result<RunHandle>;

    /// Write the run record to the ledger.
    fn save_run(&self, run: &RunHandle) -> Result<()>;
}
