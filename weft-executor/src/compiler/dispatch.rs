//! Dispatch resolution.

use crate::engine::Engine;
use crate::scope::ExecutionScope;
use crate::stats::{Diagnostic, DiagnosticKind};
use std::sync::Arc;
use tracing::instrument;
use weft_core::error::{Result, WeftError};
use weft_core::graph::{rewrite, Descend, Node, Op, OpInputsMap};
use weft_core::registry::OpDef;
use weft_core::types::{Type, TypeOracle};

/// Ops whose inputs are not meaningful before execution; dispatch leaves
/// them exactly as written.
pub(crate) const PASSTHROUGH_OPS: &[&str] = &["query-raw", "file-type"];

#[instrument(skip_all, fields(roots = nodes.len()))]
pub(super) fn dispatch_pass(
    engine: &Engine,
    scope: &mut ExecutionScope,
    nodes: &[Node],
) -> Result<Vec<Node>> {
    rewrite(nodes, Descend::IntoLambdas, |_, node, _| {
        bind(engine, scope, node, DiagnosticKind::Dispatch)
    })
}

/// Bind an output node to its dispatched definition.
///
/// The rebuilt node carries the canonical op name, the definition's
/// parameter names in positional order, and the definition's output type.
/// `node` itself is returned when nothing changes.
pub(super) fn bind(
    engine: &Engine,
    scope: &mut ExecutionScope,
    node: Node,
    kind: DiagnosticKind,
) -> Result<Node> {
    let Some(op) = node.as_op() else {
        return Ok(node);
    };
    if PASSTHROUGH_OPS.contains(&op.name()) {
        return Ok(node);
    }

    let arg_types: Vec<Type> = op.input_nodes().map(|n| n.ty().clone()).collect();
    let def = select(engine, scope, &node, op, &arg_types)?;

    let mut renamed = Vec::new();
    let mut inputs = OpInputsMap::with_capacity(op.inputs().len());
    for (position, (name, input)) in op.inputs().iter().enumerate() {
        let (param, expected) = match def.inputs().get(position) {
            Some((param, ty)) => (param.clone(), Some(ty)),
            None => (name.clone(), None),
        };
        if &param != name {
            renamed.push(format!("{}->{}", name, param));
        }
        if let Some(expected) = expected {
            if !accepts_arg(engine.oracle(), expected, input.ty()) {
                engine.check_type(scope, kind, def.name(), node.id(), expected, input.ty());
            }
        }
        inputs.insert(param, input.clone());
    }
    if !renamed.is_empty() {
        tracing::warn!(
            op = %def.name(),
            node = %node.id(),
            renamed = %renamed.join(", "),
            "Dispatch renamed op inputs"
        );
    }

    let declared = def.output_type(&arg_types);
    let mut ty = match declared {
        Type::Any => node.ty().clone(),
        declared => declared,
    };
    if def.is_async() && !ty.is_run() {
        ty = Type::run(ty);
    }

    if op.name() == def.name() && renamed.is_empty() && &ty == node.ty() {
        return Ok(node);
    }
    Ok(Node::from_op(ty, Op::new(def.name(), inputs)))
}

/// Most specific definition accepting `arg_types`.
fn select(
    engine: &Engine,
    scope: &mut ExecutionScope,
    node: &Node,
    op: &Op,
    arg_types: &[Type],
) -> Result<Arc<OpDef>> {
    let registry = engine.registry();
    let oracle = engine.oracle();

    let exact = registry.lookup(op.name());
    if let Some(def) = &exact {
        if accepts(oracle, def, arg_types) {
            return Ok(Arc::clone(def));
        }
    }

    let common = common_name(op.name());
    let candidates = registry.find_candidates(common);
    let mut best: Option<&Arc<OpDef>> = None;
    for candidate in candidates.iter().filter(|def| accepts(oracle, def, arg_types)) {
        best = match best {
            Some(current) if !more_specific(oracle, candidate, current) => Some(current),
            _ => Some(candidate),
        };
    }
    if let Some(def) = best {
        return Ok(Arc::clone(def));
    }

    let rendered = render_types(arg_types);
    match exact {
        Some(def) => {
            tracing::warn!(
                op = %def.name(),
                node = %node.id(),
                args = %rendered,
                "No candidate accepts the inputs; keeping the named op"
            );
            if engine.config().strict_types {
                scope.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::Signature,
                    op: def.name().to_string(),
                    node: node.id(),
                    expected: render_types(def.inputs().iter().map(|(_, ty)| ty)),
                    actual: rendered,
                });
            }
            Ok(def)
        }
        None if candidates.is_empty() => Err(WeftError::UnknownOperation {
            op: op.name().to_string(),
        }),
        None => Err(WeftError::NoMatchingDispatch {
            op: op.name().to_string(),
            arg_types: rendered,
        }),
    }
}

/// Name after the last `-`: `number-add` dispatches as `add`.
fn common_name(name: &str) -> &str {
    name.rsplit_once('-').map_or(name, |(_, common)| common)
}

fn accepts(oracle: &dyn TypeOracle, def: &OpDef, arg_types: &[Type]) -> bool {
    def.inputs().len() == arg_types.len()
        && def
            .inputs()
            .iter()
            .zip(arg_types)
            .all(|((_, param), arg)| accepts_arg(oracle, param, arg))
}

/// Whether `arg` can feed `param`, directly or after a coercion adapter.
pub(super) fn accepts_arg(oracle: &dyn TypeOracle, param: &Type, arg: &Type) -> bool {
    if matches!(arg, Type::Any) || oracle.is_assignable(param, arg) {
        return true;
    }
    match arg {
        Type::Run(inner) => oracle.is_assignable(param, inner),
        Type::Function { inputs, output } if inputs.is_empty() => {
            oracle.is_assignable(param, output)
        }
        _ => false,
    }
}

/// `a` is strictly more specific than `b` when every parameter of `a`
/// fits the matching parameter of `b`, and not the other way round.
fn more_specific(oracle: &dyn TypeOracle, a: &OpDef, b: &OpDef) -> bool {
    let narrower = |x: &OpDef, y: &OpDef| {
        x.inputs()
            .iter()
            .zip(y.inputs())
            .all(|((_, tx), (_, ty))| oracle.is_assignable(ty, tx))
    };
    narrower(a, b) && !narrower(b, a)
}

fn render_types<'a>(types: impl IntoIterator<Item = &'a Type>) -> String {
    types
        .into_iter()
        .map(Type::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::registry::{MemoryRegistry, OpDef};
    use weft_core::types::StructuralOracle;
    use weft_core::value::NodeOutput;

    fn def(name: &str, params: &[(&str, Type)]) -> OpDef {
        params.iter().fold(
            OpDef::new(name, |_, _| Ok(NodeOutput::new(0i64))),
            |def, (param, ty)| def.input(*param, ty.clone()),
        )
    }

    fn engine(registry: MemoryRegistry) -> Engine {
        Engine::builder()
            .registry(Arc::new(registry))
            .build()
            .unwrap()
    }

    #[test]
    fn adapters_count_as_acceptance() {
        let oracle = StructuralOracle::new();
        assert!(accepts_arg(&oracle, &Type::Int, &Type::run(Type::Int)));
        let thunk = Type::function(Vec::<(String, Type)>::new(), Type::Int);
        assert!(accepts_arg(&oracle, &Type::Number, &thunk));
        assert!(!accepts_arg(&oracle, &Type::String, &Type::run(Type::Int)));
        assert!(accepts_arg(&oracle, &Type::String, &Type::Any));
    }

    #[test]
    fn most_specific_candidate_wins() {
        let registry = MemoryRegistry::new()
            .with(def("number-add", &[("lhs", Type::Number), ("rhs", Type::Number)]))
            .with(def("int-add", &[("a", Type::Int), ("b", Type::Int)]));
        let engine = engine(registry);
        let mut scope = engine.new_scope(false);

        let ints = Node::output(
            Type::Any,
            "add",
            [("x", Node::literal(1i64)), ("y", Node::literal(2i64))],
        );
        let bound = bind(&engine, &mut scope, ints, DiagnosticKind::Dispatch).unwrap();
        let op = bound.as_op().unwrap();
        assert_eq!(op.name(), "int-add");
        assert!(op.inputs().contains_key("a"));

        let floats = Node::output(
            Type::Any,
            "add",
            [("x", Node::literal(1.5)), ("y", Node::literal(2i64))],
        );
        let bound = bind(&engine, &mut scope, floats, DiagnosticKind::Dispatch).unwrap();
        assert_eq!(bound.op_name(), Some("number-add"));
    }

    #[test]
    fn unknown_and_unmatched_names_fail() {
        let registry =
            MemoryRegistry::new().with(def("number-add", &[("lhs", Type::Number), ("rhs", Type::Number)]));
        let engine = engine(registry);
        let mut scope = engine.new_scope(false);

        let unknown = Node::output(Type::Any, "frobnicate", [("x", Node::literal(1i64))]);
        let err = bind(&engine, &mut scope, unknown, DiagnosticKind::Dispatch).unwrap_err();
        assert_eq!(err.code(), "E101");

        let strings = Node::output(
            Type::Any,
            "add",
            [("x", Node::literal("a")), ("y", Node::literal("b"))],
        );
        let err = bind(&engine, &mut scope, strings, DiagnosticKind::Dispatch).unwrap_err();
        assert_eq!(err.code(), "E102");
    }

    #[test]
    fn passthrough_ops_are_untouched() {
        let engine = engine(MemoryRegistry::new());
        let mut scope = engine.new_scope(false);
        let raw = Node::output(Type::Any, "query-raw", [("q", Node::literal("select"))]);
        let out = bind(&engine, &mut scope, raw.clone(), DiagnosticKind::Dispatch).unwrap();
        assert!(out.ptr_eq(&raw));
    }

    #[test]
    fn async_outputs_are_run_typed() {
        let registry = MemoryRegistry::new().with(
            def("model-train", &[("epochs", Type::Int)])
                .output(Type::Float)
                .asynchronous(),
        );
        let engine = engine(registry);
        let mut scope = engine.new_scope(false);
        let train = Node::output(Type::Any, "model-train", [("epochs", Node::literal(3i64))]);
        let bound = bind(&engine, &mut scope, train, DiagnosticKind::Dispatch).unwrap();
        assert_eq!(bound.ty(), &Type::run(Type::Float));
    }

    #[test]
    fn bound_node_is_reused_when_unchanged() {
        let registry =
            MemoryRegistry::new().with(def("number-add", &[("lhs", Type::Number), ("rhs", Type::Number)]).output(Type::Number));
        let engine = engine(registry);
        let mut scope = engine.new_scope(false);
        let sum = Node::output(
            Type::Number,
            "number-add",
            [("lhs", Node::literal(1i64)), ("rhs", Node::literal(2i64))],
        );
        let bound = bind(&engine, &mut scope, sum.clone(), DiagnosticKind::Dispatch).unwrap();
        assert!(bound.ptr_eq(&sum));
    }
}
