//! Resolver-facing view of the engine.

use crate::engine::Engine;
use crate::fanout;
use crate::scope::ExecutionScope;
use weft_core::error::Result;
use weft_core::graph::Lambda;
use weft_core::registry::ResolveContext;
use weft_core::store::{ObjectStore, RunHandle};
use weft_core::value::NodeOutput;

/// [`ResolveContext`] handed to every resolver invocation.
pub(crate) struct EngineContext<'a> {
    engine: &'a Engine,
    scope: &'a mut ExecutionScope,
    run: Option<RunHandle>,
}

impl<'a> EngineContext<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        scope: &'a mut ExecutionScope,
        run: Option<RunHandle>,
    ) -> Self {
        Self { engine, scope, run }
    }
}

impl ResolveContext for EngineContext<'_> {
    fn run(&self) -> Option<&RunHandle> {
        self.run.as_ref()
    }

    fn store(&self) -> &dyn ObjectStore {
        self.engine.store().as_ref()
    }

    fn apply(&mut self, lambda: &Lambda, args: Vec<NodeOutput>) -> Result<NodeOutput> {
        fanout::apply(self.engine, self.scope, lambda, args)
    }

    fn fan_out(&mut self, lambda: &Lambda, items: Vec<NodeOutput>) -> Result<Vec<NodeOutput>> {
        fanout::map(self.engine, self.scope, lambda, items)
    }
}
