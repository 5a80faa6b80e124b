//! Background workers for async ops.
//!
//! An async op's node yields its [`RunHandle`] immediately; the resolver runs
//! on a blocking thread of an engine-owned tokio runtime and completes the
//! handle when done. Nothing in the wave loop waits for it.

use crate::context::EngineContext;
use crate::engine::Engine;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::{Builder, Runtime};
use weft_core::error::{Result, WeftError};
use weft_core::registry::{OpDef, OpInputs};
use weft_core::store::RunHandle;

/// Pool that runs async resolvers off the scheduler thread.
pub(crate) struct BackgroundWorkers {
    runtime: Option<Runtime>,
    in_flight: Arc<AtomicUsize>,
}

impl BackgroundWorkers {
    pub(crate) fn new(threads: usize) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(threads.max(1))
            .thread_name("weft-worker")
            .enable_time()
            .build()
            .map_err(|e| WeftError::WorkerUnavailable {
                cause: e.to_string(),
            })?;
        Ok(Self {
            runtime: Some(runtime),
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run `def` over `inputs` in the background, completing `run`.
    pub(crate) fn dispatch(
        &self,
        engine: &Engine,
        def: Arc<OpDef>,
        inputs: OpInputs,
        run: RunHandle,
    ) -> Result<()> {
        let runtime = self.runtime.as_ref().ok_or_else(|| WeftError::WorkerUnavailable {
            cause: "worker runtime has shut down".to_string(),
        })?;
        let engine = engine.clone();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(op = %def.name(), fingerprint = %run.fingerprint(), "Async run dispatched");
        runtime.spawn_blocking(move || {
            run_in_background(&engine, &def, &inputs, &run);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(())
    }
}

impl Drop for BackgroundWorkers {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Body of one background run: resolve, then finish or fail the handle.
fn run_in_background(engine: &Engine, def: &OpDef, inputs: &OpInputs, run: &RunHandle) {
    run.mark_running();
    let started = Instant::now();
    let mut scope = engine.new_scope(false);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut ctx = EngineContext::new(engine, &mut scope, Some(run.clone()));
        def.resolve(inputs, &mut ctx)
    }));

    let failure = match outcome {
        Ok(Ok(output)) => {
            let saved = match output.object_ref {
                Some(reference) => Ok(reference),
                None => engine
                    .store()
                    .save(&output.value, Some(&run.fingerprint().object_name())),
            };
            match saved {
                Ok(reference) => {
                    run.finish(output.value, reference);
                    None
                }
                Err(err) => Some(err.to_string()),
            }
        }
        Ok(Err(err)) => Some(err.to_string()),
        Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
    };

    match failure {
        None => {
            tracing::debug!(
                op = %def.name(),
                fingerprint = %run.fingerprint(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Async run finished"
            );
        }
        Some(cause) => {
            tracing::error!(
                op = %def.name(),
                fingerprint = %run.fingerprint(),
                cause = %cause,
                "Async run failed"
            );
            run.fail(cause);
        }
    }

    if let Err(err) = engine.store().save_run(run) {
        tracing::error!(fingerprint = %run.fingerprint(), error = %err, "Failed to save run");
    }
}

/// Text of a panic payload when it carries a string.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_strings() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload = panic::catch_unwind(|| panic!("{}", String::from("owned"))).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
