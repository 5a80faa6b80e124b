//! Final refinement: dispatch against execution-derived types.

use super::dispatch::bind;
use crate::cache::refinement_key;
use crate::engine::Engine;
use crate::scope::ExecutionScope;
use crate::stats::DiagnosticKind;
use tracing::instrument;
use weft_core::error::Result;
use weft_core::graph::{free_vars, rewrite, Descend, Node};
use weft_core::registry::OpInputs;
use weft_core::store::ObjectRef;
use weft_core::types::Type;

#[instrument(skip_all, fields(roots = nodes.len()))]
pub(super) fn refine_pass(
    engine: &Engine,
    scope: &mut ExecutionScope,
    nodes: &[Node],
) -> Result<Vec<Node>> {
    rewrite(nodes, Descend::IntoLambdas, |_, node, depth| {
        let node = bind(engine, scope, node, DiagnosticKind::Refinement)?;
        if depth > 0 {
            return Ok(node);
        }
        refine(engine, scope, node)
    })
}

/// Replace the node's type by its refiner's answer.
///
/// Executes the node's inputs, never the node itself. Lambda bodies and
/// nodes with free variables are left alone.
fn refine(engine: &Engine, scope: &mut ExecutionScope, node: Node) -> Result<Node> {
    let Some(op) = node.as_op() else {
        return Ok(node);
    };
    let Some(def) = engine.registry().lookup(op.name()) else {
        return Ok(node);
    };
    let Some(refiner) = def.refiner() else {
        return Ok(node);
    };
    if !free_vars(&node).is_empty() {
        return Ok(node);
    }

    let upstream: Vec<Node> = op.input_nodes().cloned().collect();
    let outputs = engine.execute_in(scope, &upstream)?;
    let mut inputs = OpInputs::new(def.name());
    for (name, output) in op.inputs().keys().zip(outputs) {
        inputs.push(name.clone(), output);
    }

    let refs: Vec<(&str, ObjectRef)> = inputs
        .iter()
        .map(|(name, output)| (name, output.reference()))
        .collect();
    let key = refinement_key(def.name(), refs.iter().map(|(name, r)| (*name, r)));
    let refined = match engine.refinements().get(&key) {
        Some(hit) => hit,
        None => {
            let ty = refiner(&inputs)?;
            engine.refinements().insert(key, ty.clone());
            ty
        }
    };

    if &refined == node.ty() {
        return Ok(node);
    }
    if !matches!(node.ty(), Type::Any) {
        engine.check_type(
            scope,
            DiagnosticKind::Refinement,
            def.name(),
            node.id(),
            node.ty(),
            &refined,
        );
    }
    tracing::debug!(op = %def.name(), from = %node.ty(), to = %refined, "Refined output type");
    Ok(node.with_type(refined))
}
