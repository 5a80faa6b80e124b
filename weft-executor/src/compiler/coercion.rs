//! Adapter insertion for pending runs and zero-argument functions.

use crate::builtins::{AWAIT_OP, CALL_OP};
use crate::engine::Engine;
use std::collections::HashMap;
use tracing::instrument;
use weft_core::error::Result;
use weft_core::graph::{rewrite, Descend, Node, Op, OpInputsMap};
use weft_core::types::{NodeId, Type};

/// Ops that take their inputs raw, runs and functions included.
const EXEMPT_OPS: &[&str] = &[
    "getattr",
    "identity",
    AWAIT_OP,
    CALL_OP,
    "panel-config",
    "panel-table-config",
];

#[instrument(skip_all, fields(roots = nodes.len()))]
pub(super) fn coercion_pass(engine: &Engine, nodes: &[Node]) -> Result<Vec<Node>> {
    // one adapter per wrapped node, however many consumers it has
    let mut adapters: HashMap<NodeId, Node> = HashMap::new();
    rewrite(nodes, Descend::IntoLambdas, |_, node, _| {
        Ok(coerce(engine, node, &mut adapters))
    })
}

fn coerce(engine: &Engine, node: Node, adapters: &mut HashMap<NodeId, Node>) -> Node {
    let Some(op) = node.as_op() else {
        return node;
    };
    if is_exempt(op.name()) {
        return node;
    }
    let Some(def) = engine.registry().lookup(op.name()) else {
        return node;
    };

    let oracle = engine.oracle();
    let mut changed = false;
    let mut inputs = OpInputsMap::with_capacity(op.inputs().len());
    for (position, (name, input)) in op.inputs().iter().enumerate() {
        let wanted = def.inputs().get(position).map(|(_, ty)| ty);
        let fits = wanted.map_or(true, |ty| oracle.is_assignable(ty, input.ty()));
        let adapted = if fits { None } else { adapter_for(input, adapters) };
        match adapted {
            Some(adapter) => {
                changed = true;
                inputs.insert(name.clone(), adapter);
            }
            None => {
                inputs.insert(name.clone(), input.clone());
            }
        }
    }

    if changed {
        Node::from_op(node.ty().clone(), Op::new(op.name(), inputs))
    } else {
        node
    }
}

/// `run-await` for run-typed nodes, `function-call` for thunks.
fn adapter_for(input: &Node, adapters: &mut HashMap<NodeId, Node>) -> Option<Node> {
    if let Some(done) = adapters.get(&input.id()) {
        return Some(done.clone());
    }
    let adapter = match input.ty() {
        Type::Run(inner) => Node::output((**inner).clone(), AWAIT_OP, [("run", input.clone())]),
        Type::Function { inputs, output } if inputs.is_empty() => {
            Node::output((**output).clone(), CALL_OP, [("fn", input.clone())])
        }
        _ => return None,
    };
    tracing::debug!(
        node = %input.id(),
        adapter = adapter.op_name().unwrap_or_default(),
        "Inserted coercion adapter"
    );
    adapters.insert(input.id(), adapter.clone());
    Some(adapter)
}

fn is_exempt(name: &str) -> bool {
    let common = name.rsplit_once('-').map_or(name, |(_, common)| common);
    EXEMPT_OPS.contains(&name) || EXEMPT_OPS.contains(&common)
}
