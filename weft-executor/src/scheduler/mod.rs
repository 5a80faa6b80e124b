//! Forward-graph scheduler.
//!
//! - [`ForwardGraph`] - one entry per distinct output node still to run,
//!   wired from inputs to their dependents
//! - [`run_graph`] - breadth-level (wave) execution on the calling thread
//!
//! Results live in the request's shared result store, so a node executed by
//! a nested scheduler run is found there and never executed twice.

mod graph;
mod waves;

pub(crate) use graph::ForwardGraph;
pub(crate) use waves::run_waves;

use crate::cache;
use crate::engine::Engine;
use crate::scope::ExecutionScope;
use weft_core::error::Result;
use weft_core::graph::Node;
use weft_core::value::NodeOutput;

/// Execute everything `terminals` need; outputs come back in order.
pub(crate) fn run_graph(
    engine: &Engine,
    scope: &mut ExecutionScope,
    terminals: &[Node],
) -> Result<Vec<NodeOutput>> {
    let mut graph = ForwardGraph::build(terminals, &scope.results)?;
    run_waves(engine, scope, &mut graph)?;
    terminals
        .iter()
        .map(|node| cache::input_output(scope, node))
        .collect()
}
