//! Static folding of lambda bodies.

use crate::cache::{flow_tags, memo_key};
use crate::engine::Engine;
use crate::scope::ExecutionScope;
use std::collections::HashMap;
use weft_core::error::{Result, WeftError};
use weft_core::graph::{rewrite, var_dependent, walk, Descend, Lambda, Node, NodeKind, Op};
use weft_core::registry::OpInputs;
use weft_core::types::NodeId;
use weft_core::value::{NodeOutput, Value};

/// A lambda whose element-independent parts were replaced by literals.
#[derive(Debug)]
pub(super) struct Folded {
    pub(super) lambda: Lambda,
    /// Outputs of the inserted literals by literal id, tags included.
    pub(super) known: HashMap<NodeId, NodeOutput>,
}

/// Replace every subexpression of the body that does not depend on a
/// parameter and whose result is already in the request scope.
///
/// A result is in scope when the node itself has one, or when the op is
/// pure and the request memo holds its invocation.
pub(super) fn fold(engine: &Engine, scope: &ExecutionScope, lambda: &Lambda) -> Result<Folded> {
    let dependent = var_dependent(std::slice::from_ref(lambda.body()));
    let mut by_original: HashMap<NodeId, NodeOutput> = HashMap::new();
    let mut known: HashMap<NodeId, NodeOutput> = HashMap::new();

    let mut bodies = rewrite(std::slice::from_ref(lambda.body()), Descend::Skip, |original, node, _| {
        if dependent.contains(&original.id()) {
            return Ok(node);
        }
        let Some(op) = original.as_op() else {
            return Ok(node);
        };
        let Some(output) = known_output(engine, scope, original, op, &by_original) else {
            return Ok(node);
        };
        let literal = Node::constant(original.ty().clone(), output.value.clone());
        by_original.insert(original.id(), output.clone());
        known.insert(literal.id(), output);
        Ok(literal)
    })?;
    let body = bodies.pop().ok_or_else(|| WeftError::InvalidGraph {
        cause: "lambda body vanished while folding".to_string(),
    })?;

    if !known.is_empty() {
        tracing::debug!(folded = known.len(), "Folded lambda body");
    }
    Ok(Folded {
        lambda: lambda.with_body(body),
        known,
    })
}

fn known_output(
    engine: &Engine,
    scope: &ExecutionScope,
    node: &Node,
    op: &Op,
    folded: &HashMap<NodeId, NodeOutput>,
) -> Option<NodeOutput> {
    if let Some(done) = scope.results.get(&node.id()) {
        return Some(done.clone());
    }
    let def = engine.registry().lookup(op.name())?;
    if !def.is_pure() || def.is_async() {
        return None;
    }

    let mut inputs = OpInputs::new(def.name());
    for (name, input) in op.inputs() {
        let output = match (folded.get(&input.id()), scope.results.get(&input.id())) {
            (Some(output), _) | (None, Some(output)) => output.clone(),
            _ => match input.kind() {
                NodeKind::Const(value) => NodeOutput::new(value.clone()),
                NodeKind::Void => NodeOutput::new(Value::Null),
                _ => return None,
            },
        };
        inputs.push(name.clone(), output);
    }
    let hit = scope.memo.get(&memo_key(def.name(), &inputs))?;
    Some(flow_tags(&def, &inputs, hit.clone()))
}

/// Whether the direct evaluator may run `body`.
///
/// Async ops, ops that must be ledgered and ops that need the graph
/// scheduler send the whole map down the per-element scheduler path, as
/// do ops the registry does not know.
pub(super) fn eligible(engine: &Engine, body: &Node) -> bool {
    let mut bodies = vec![body.clone()];
    while let Some(root) = bodies.pop() {
        for node in walk(std::slice::from_ref(&root)) {
            match node.kind() {
                NodeKind::Output(op) => {
                    let Some(def) = engine.registry().lookup(op.name()) else {
                        return false;
                    };
                    let flags = def.op_flags();
                    if def.is_async() || flags.cache_required || flags.graph_engine_required {
                        return false;
                    }
                }
                NodeKind::Const(Value::Function(inner)) => bodies.push(inner.body().clone()),
                _ => {}
            }
        }
    }
    true
}
