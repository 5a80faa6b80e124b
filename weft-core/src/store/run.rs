//! Run records and live run handles.

use super::ObjectRef;
use crate::error::{Result, WeftError};
use crate::types::Fingerprint;
use crate::value::{NodeOutput, Value};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Lifecycle state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Started and not yet completed.
    Running,
    /// Completed; the output reference is set.
    Finished,
    /// The resolver failed or panicked.
    Failed {
        /// Failure reported by the worker.
        cause: String,
    },
}

impl RunState {
    /// Whether the run has reached a final state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Ledger record of one op invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Cache key of the invocation.
    pub fingerprint: Fingerprint,
    /// Canonical op name.
    pub op_name: String,
    /// Input references, in binding order.
    pub input_refs: Vec<(String, ObjectRef)>,
    /// Reference of the output, once finished.
    pub output_ref: Option<ObjectRef>,
    /// Lifecycle state.
    #[serde(flatten)]
    pub state: RunState,
    /// Last progress reported by the resolver, in `0.0..=1.0`.
    pub progress: Option<f64>,
}

struct RunSlot {
    run: Run,
    output: Option<Value>,
}

struct RunCell {
    fingerprint: Fingerprint,
    slot: Mutex<RunSlot>,
    done: Condvar,
    notify: Notify,
}

/// Shared, live view of a run.
///
/// Clones refer to the same run. Completion is signalled both to blocked
/// threads ([`wait`](Self::wait)) and to async tasks
/// ([`finished`](Self::finished)).
#[derive(Clone)]
pub struct RunHandle(Arc<RunCell>);

impl RunHandle {
    /// A new run in state `Running`.
    pub fn new(fingerprint: Fingerprint, op_name: impl Into<String>) -> Self {
        let run = Run {
            fingerprint: fingerprint.clone(),
            op_name: op_name.into(),
            input_refs: Vec::new(),
            output_ref: None,
            state: RunState::Running,
            progress: None,
        };
        Self(Arc::new(RunCell {
            fingerprint,
            slot: Mutex::new(RunSlot { run, output: None }),
            done: Condvar::new(),
            notify: Notify::new(),
        }))
    }

    /// Cache key of the run.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.0.fingerprint
    }

    /// Snapshot of the record.
    pub fn record(&self) -> Run {
        self.0.slot.lock().run.clone()
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.0.slot.lock().run.state.clone()
    }

    /// Output reference, once finished.
    pub fn output_ref(&self) -> Option<ObjectRef> {
        self.0.slot.lock().run.output_ref.clone()
    }

    /// Last reported progress.
    pub fn progress(&self) -> Option<f64> {
        self.0.slot.lock().run.progress
    }

    /// Whether both handles refer to the same run.
    pub fn ptr_eq(&self, other: &RunHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Record the input references.
    pub fn set_inputs(&self, input_refs: Vec<(String, ObjectRef)>) {
        self.0.slot.lock().run.input_refs = input_refs;
    }

    /// Report incremental progress, clamped to `0.0..=1.0`.
    pub fn set_progress(&self, progress: f64) {
        self.0.slot.lock().run.progress = Some(progress.clamp(0.0, 1.0));
    }

    /// Mark the run as running.
    pub fn mark_running(&self) {
        self.0.slot.lock().run.state = RunState::Running;
    }

    /// Complete the run with its output.
    pub fn finish(&self, output: Value, output_ref: ObjectRef) {
        {
            let mut slot = self.0.slot.lock();
            slot.run.state = RunState::Finished;
            slot.run.output_ref = Some(output_ref);
            slot.run.progress = Some(1.0);
            slot.output = Some(output);
        }
        self.signal();
    }

    /// Complete the run as failed.
    pub fn fail(&self, cause: impl Into<String>) {
        {
            let mut slot = self.0.slot.lock();
            slot.run.state = RunState::Failed {
                cause: cause.into(),
            };
        }
        self.signal();
    }

    fn signal(&self) {
        self.0.done.notify_all();
        self.0.notify.notify_waiters();
    }

    /// Block the calling thread until the run completes.
    pub fn wait(&self) -> Result<NodeOutput> {
        let mut slot = self.0.slot.lock();
        while !slot.run.state.is_terminal() {
            self.0.done.wait(&mut slot);
        }
        self.outcome(&slot)
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns `None` when the run is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<NodeOutput>> {
        let mut slot = self.0.slot.lock();
        if !slot.run.state.is_terminal() {
            let _ = self.0.done.wait_while_for(
                &mut slot,
                |slot| !slot.run.state.is_terminal(),
                timeout,
            );
        }
        if slot.run.state.is_terminal() {
            Some(self.outcome(&slot))
        } else {
            None
        }
    }

    /// Resolve once the run completes, without blocking a thread.
    pub async fn finished(&self) -> Result<NodeOutput> {
        loop {
            let notified = self.0.notify.notified();
            {
                let slot = self.0.slot.lock();
                if slot.run.state.is_terminal() {
                    return self.outcome(&slot);
                }
            }
            notified.await;
        }
    }

    fn outcome(&self, slot: &RunSlot) -> Result<NodeOutput> {
        match (&slot.run.state, &slot.output, &slot.run.output_ref) {
            (RunState::Finished, Some(value), Some(output_ref)) => {
                Ok(NodeOutput::stored(value.clone(), output_ref.clone()))
            }
            (RunState::Finished, _, _) => Err(WeftError::ObjectNotFound {
                reference: self.0.fingerprint.object_name(),
            }),
            (RunState::Failed { cause }, _, _) => Err(WeftError::AsyncRunFailed {
                fingerprint: self.0.fingerprint.clone(),
                cause: cause.clone(),
            }),
            (RunState::Running, _, _) => Err(WeftError::Store {
                cause: format!("run {} is still running", self.0.fingerprint),
            }),
        }
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("fingerprint", &self.0.fingerprint)
            .field("state", &self.state())
            .finish()
    }
}
