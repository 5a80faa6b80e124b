//! Compiler: the four ordered rewrite passes.
//!
//! 1. [`dispatch`] binds every op to its most specific registered
//!    definition using the current, possibly unrefined, input types.
//! 2. [`pushdown`] projects table reads onto the columns used downstream.
//! 3. [`coercion`] wraps pending runs and zero-argument functions that feed
//!    ops wanting their values.
//! 4. [`refine`] dispatches again, this time against refined types; it is
//!    the only pass that may execute part of the graph.
//!
//! Every pass preserves sharing: a node rewritten once is reused by every
//! consumer, and untouched subgraphs keep their identity.

mod coercion;
mod dispatch;
mod pushdown;
mod refine;

use crate::engine::Engine;
use crate::scope::ExecutionScope;
use weft_core::error::Result;
use weft_core::graph::Node;

/// Run all passes over `nodes`; the result has one entry per input node.
pub(crate) fn compile(
    engine: &Engine,
    scope: &mut ExecutionScope,
    nodes: &[Node],
) -> Result<Vec<Node>> {
    let dispatched = dispatch::dispatch_pass(engine, scope, nodes)?;
    let projected = pushdown::pushdown_pass(&dispatched)?;
    let coerced = coercion::coercion_pass(engine, &projected)?;
    refine::refine_pass(engine, scope, &coerced)
}
