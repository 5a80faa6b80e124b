//! Direct evaluation of folded lambda bodies.

use super::fold::Folded;
use crate::cache::{flow_tags, memo_key};
use crate::context::EngineContext;
use crate::engine::Engine;
use crate::scope::ExecutionScope;
use std::collections::HashMap;
use std::time::Instant;
use weft_core::error::{Result, WeftError};
use weft_core::graph::{close_over, Node, NodeKind};
use weft_core::registry::OpInputs;
use weft_core::types::NodeId;
use weft_core::value::{NodeOutput, Value};

/// Evaluates a folded body for one set of argument bindings without
/// building a forward graph.
///
/// Pure invocations go through the request memo; nothing is written to the
/// run ledger.
pub(super) struct DirectEvaluator<'a> {
    engine: &'a Engine,
    folded: &'a Folded,
    bindings: HashMap<String, NodeOutput>,
    // literal nodes standing in for the bindings inside nested lambdas
    captured: HashMap<String, Node>,
    local: HashMap<NodeId, NodeOutput>,
}

impl<'a> DirectEvaluator<'a> {
    pub(super) fn new(engine: &'a Engine, folded: &'a Folded, args: Vec<NodeOutput>) -> Self {
        let bindings = folded
            .lambda
            .param_names()
            .map(str::to_string)
            .zip(args)
            .collect();
        Self {
            engine,
            folded,
            bindings,
            captured: HashMap::new(),
            local: HashMap::new(),
        }
    }

    pub(super) fn run(mut self, scope: &mut ExecutionScope) -> Result<NodeOutput> {
        let body = self.folded.lambda.body().clone();
        self.eval(scope, &body)
    }

    fn eval(&mut self, scope: &mut ExecutionScope, node: &Node) -> Result<NodeOutput> {
        let id = node.id();
        let hit = self
            .local
            .get(&id)
            .or_else(|| self.folded.known.get(&id))
            .or_else(|| scope.results.get(&id));
        if let Some(hit) = hit {
            return Ok(hit.clone());
        }

        let output = match node.kind() {
            NodeKind::Var(name) => self
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| WeftError::UnboundVariable { name: name.clone() })?,
            NodeKind::Const(Value::Function(lambda)) => {
                let captured = self.capture(scope);
                match close_over(lambda, captured) {
                    Some(closed) => NodeOutput::new(Value::Function(closed)),
                    None => NodeOutput::new(Value::Function(lambda.clone())),
                }
            }
            NodeKind::Const(value) => NodeOutput::new(value.clone()),
            NodeKind::Void => NodeOutput::new(Value::Null),
            NodeKind::Output(op) => {
                let def = self.engine.lookup(op.name())?;
                let mut inputs = OpInputs::new(def.name());
                for (name, input) in op.inputs() {
                    let value = self.eval(scope, input)?;
                    inputs.push(name.clone(), value);
                }
                scope.stats.nodes_executed += 1;

                let key = def.is_pure().then(|| memo_key(def.name(), &inputs));
                let memoized = key.as_ref().and_then(|key| scope.memo.get(key)).cloned();
                let raw = match memoized {
                    Some(raw) => {
                        scope.stats.record_cache_hit(def.name());
                        raw
                    }
                    None => {
                        let started = Instant::now();
                        let raw = {
                            let mut ctx = EngineContext::new(self.engine, scope, None);
                            def.resolve(&inputs, &mut ctx)?
                        };
                        scope.stats.record_invocation(def.name(), started.elapsed());
                        if let Some(key) = key {
                            scope.memo.insert(key, raw.clone());
                        }
                        raw
                    }
                };
                flow_tags(&def, &inputs, raw)
            }
        };
        self.local.insert(id, output.clone());
        Ok(output)
    }

    /// Bindings as literal nodes whose outputs, tags included, are seeded
    /// into the request results.
    fn capture(&mut self, scope: &mut ExecutionScope) -> &HashMap<String, Node> {
        if self.captured.is_empty() {
            for (name, output) in &self.bindings {
                let literal = Node::literal(output.value.clone());
                scope.results.insert(literal.id(), output.clone());
                self.captured.insert(name.clone(), literal);
            }
        }
        &self.captured
    }
}
