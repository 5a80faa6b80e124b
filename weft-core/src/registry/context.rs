//! Engine services available to a running resolver.

use crate::error::Result;
use crate::graph::Lambda;
use crate::store::{ObjectStore, RunHandle};
use crate::value::NodeOutput;

/// Callbacks a resolver may use while it runs.
///
/// Implemented by the executor. Higher-order ops (`map`, `function-call`)
/// evaluate their function arguments through [`apply`](Self::apply) and
/// [`fan_out`](Self::fan_out) so that nested evaluation shares the caller's
/// result store, memo cache, statistics and parallelism budget.
pub trait ResolveContext {
    /// The run record of the current invocation, for async resolvers.
    ///
    /// Resolvers report incremental progress through it.
    fn run(&self) -> Option<&RunHandle>;

    /// The object store.
    fn store(&self) -> &dyn ObjectStore;

    /// Evaluate `lambda` with its parameters bound positionally to `args`.
    fn apply(&mut self, lambda: &Lambda, args: Vec<NodeOutput>) -> Result<NodeOutput>;

    /// Evaluate `lambda` once per item; results keep item order.
    ///
    /// Each call binds the item to the first parameter and, when the lambda
    /// declares one, the item's index to the second.
    fn fan_out(&mut self, lambda: &Lambda, items: Vec<NodeOutput>) -> Result<Vec<NodeOutput>>;
}

