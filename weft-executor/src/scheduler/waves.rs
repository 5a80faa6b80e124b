//! The wave loop.

use super::ForwardGraph;
use crate::cache::execute_node;
use crate::engine::Engine;
use crate::scope::ExecutionScope;
use tracing::instrument;
use weft_core::error::Result;

/// Run `graph` to completion, one breadth level at a time.
///
/// Each wave finishes before the dependents it readies are considered. The
/// first error aborts the remaining nodes; results recorded before it stay
/// in the store and the ledger.
#[instrument(skip_all, fields(nodes = graph.len()))]
pub(crate) fn run_waves(
    engine: &Engine,
    scope: &mut ExecutionScope,
    graph: &mut ForwardGraph,
) -> Result<()> {
    let mut to_run = graph.roots();
    while !to_run.is_empty() {
        let running_now = std::mem::take(&mut to_run);
        scope.stats.waves += 1;
        let span = tracing::debug_span!("wave", wave = scope.stats.waves, size = running_now.len());
        let _enter = span.enter();

        for &at in &running_now {
            execute_node(engine, scope, graph.node(at))?;
        }
        for &at in &running_now {
            to_run.extend(graph.complete(at));
        }
    }
    Ok(())
}
