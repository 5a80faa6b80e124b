//! Graph traversal and identity-preserving rewrites.

use super::node::{Lambda, Node, NodeKind, Op, OpInputsMap};
use crate::error::Result;
use crate::types::NodeId;
use crate::value::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Whether a traversal enters the bodies of function-valued consts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    /// Treat lambdas as opaque literals.
    Skip,
    /// Also visit lambda bodies.
    IntoLambdas,
}

/// All nodes reachable from `roots`, inputs before consumers.
///
/// Each distinct node appears once. Lambda bodies are not entered.
pub fn walk(roots: &[Node]) -> Vec<Node> {
    let mut order = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();
    // (node, inputs_pushed)
    let mut stack: Vec<(Node, bool)> = roots.iter().rev().map(|n| (n.clone(), false)).collect();

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node);
            continue;
        }
        if !seen.insert(node.id()) {
            continue;
        }
        stack.push((node.clone(), true));
        if let Some(op) = node.as_op() {
            for input in op.input_nodes().rev() {
                if !seen.contains(&input.id()) {
                    stack.push((input.clone(), false));
                }
            }
        }
    }

    order
}

/// Bottom-up rewrite that preserves sharing.
///
/// `f(original, rebuilt, lambda_depth)` receives each node once, after its
/// inputs were rewritten; `rebuilt` is `original` itself when no input
/// changed. The value `f` returns replaces the node everywhere it is used.
pub fn rewrite<F>(roots: &[Node], descend: Descend, mut f: F) -> Result<Vec<Node>>
where
    F: FnMut(&Node, Node, usize) -> Result<Node>,
{
    let mut memo: HashMap<NodeId, Node> = HashMap::new();
    roots
        .iter()
        .map(|root| rewrite_node(root, descend, 0, &mut memo, &mut f))
        .collect()
}

fn rewrite_node<F>(
    node: &Node,
    descend: Descend,
    depth: usize,
    memo: &mut HashMap<NodeId, Node>,
    f: &mut F,
) -> Result<Node>
where
    F: FnMut(&Node, Node, usize) -> Result<Node>,
{
    if let Some(done) = memo.get(&node.id()) {
        return Ok(done.clone());
    }

    let rebuilt = match node.kind() {
        NodeKind::Output(op) => {
            let mut changed = false;
            let mut inputs = OpInputsMap::with_capacity(op.inputs().len());
            for (name, input) in op.inputs() {
                let new_input = rewrite_node(input, descend, depth, memo, f)?;
                changed |= !new_input.ptr_eq(input);
                inputs.insert(name.clone(), new_input);
            }
            if changed {
                Node::from_op(node.ty().clone(), Op::new(op.name(), inputs))
            } else {
                node.clone()
            }
        }
        NodeKind::Const(Value::Function(lambda)) if descend == Descend::IntoLambdas => {
            let body = rewrite_node(lambda.body(), descend, depth + 1, memo, f)?;
            if body.ptr_eq(lambda.body()) {
                node.clone()
            } else {
                let lambda = lambda.with_body(body);
                Node::constant(lambda.ty(), Value::Function(lambda))
            }
        }
        _ => node.clone(),
    };

    let out = f(node, rebuilt, depth)?;
    memo.insert(node.id(), out.clone());
    Ok(out)
}

/// Variables used in `node` that no enclosing lambda inside it binds.
pub fn free_vars(node: &Node) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut seen = HashSet::new();
    collect_free(node, &mut Vec::new(), &mut seen, &mut out);
    out
}

fn collect_free(
    node: &Node,
    bound: &mut Vec<String>,
    seen: &mut HashSet<(NodeId, Vec<String>)>,
    out: &mut BTreeSet<String>,
) {
    // the same node can be free under one binder set and bound under another
    if !seen.insert((node.id(), bound.clone())) {
        return;
    }
    match node.kind() {
        NodeKind::Var(name) => {
            if !bound.iter().any(|b| b == name) {
                out.insert(name.clone());
            }
        }
        NodeKind::Output(op) => {
            for input in op.input_nodes() {
                collect_free(input, bound, seen, out);
            }
        }
        NodeKind::Const(Value::Function(lambda)) => {
            let pushed = lambda.params().len();
            bound.extend(lambda.param_names().map(str::to_string));
            collect_free(lambda.body(), bound, seen, out);
            bound.truncate(bound.len() - pushed);
        }
        _ => {}
    }
}

/// Ids of nodes under `roots` whose value depends on any free variable.
///
/// Lambda bodies are not entered; a lambda literal itself counts as
/// dependent when its body captures an outer variable.
pub fn var_dependent(roots: &[Node]) -> HashSet<NodeId> {
    let mut dependent = HashSet::new();
    for node in walk(roots) {
        let depends = match node.kind() {
            NodeKind::Var(_) => true,
            NodeKind::Output(op) => op.input_nodes().any(|i| dependent.contains(&i.id())),
            NodeKind::Const(Value::Function(_)) => !free_vars(&node).is_empty(),
            _ => false,
        };
        if depends {
            dependent.insert(node.id());
        }
    }
    dependent
}

/// Replace free variables by the bound nodes.
///
/// Lambda parameters shadow outer bindings of the same name. Nodes that do
/// not mention a substituted variable are returned unchanged.
pub fn substitute_vars(node: &Node, bindings: &HashMap<String, Node>) -> Node {
    if bindings.is_empty() {
        return node.clone();
    }
    let mut memo = HashMap::new();
    substitute(node, bindings, &mut memo)
}

fn substitute(
    node: &Node,
    bindings: &HashMap<String, Node>,
    memo: &mut HashMap<NodeId, Node>,
) -> Node {
    if let Some(done) = memo.get(&node.id()) {
        return done.clone();
    }
    let out = match node.kind() {
        NodeKind::Var(name) => bindings.get(name).cloned().unwrap_or_else(|| node.clone()),
        NodeKind::Output(op) => {
            let mut changed = false;
            let mut inputs = OpInputsMap::with_capacity(op.inputs().len());
            for (name, input) in op.inputs() {
                let new_input = substitute(input, bindings, memo);
                changed |= !new_input.ptr_eq(input);
                inputs.insert(name.clone(), new_input);
            }
            if changed {
                Node::from_op(node.ty().clone(), Op::new(op.name(), inputs))
            } else {
                node.clone()
            }
        }
        NodeKind::Const(Value::Function(lambda)) => match close_over(lambda, bindings) {
            Some(lambda) => Node::constant(lambda.ty(), Value::Function(lambda)),
            None => node.clone(),
        },
        _ => node.clone(),
    };
    memo.insert(node.id(), out.clone());
    out
}

/// Substitute outer bindings into a lambda body, honouring shadowing.
///
/// Returns `None` when nothing in the body changes.
pub fn close_over(lambda: &Lambda, bindings: &HashMap<String, Node>) -> Option<Lambda> {
    let inner: HashMap<String, Node> = bindings
        .iter()
        .filter(|(name, _)| !lambda.param_names().any(|p| p == name.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if inner.is_empty() {
        return None;
    }
    let body = substitute_vars(lambda.body(), &inner);
    if body.ptr_eq(lambda.body()) {
        None
    } else {
        Some(lambda.with_body(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn op(name: &str, inputs: Vec<(&str, Node)>) -> Node {
        Node::output(Type::Any, name, inputs)
    }

    #[test]
    fn walk_visits_shared_nodes_once_inputs_first() {
        let a = op("a", vec![]);
        let b = op("b", vec![("x", a.clone())]);
        let c = op("c", vec![("x", a.clone())]);
        let d = op("d", vec![("l", b.clone()), ("r", c.clone())]);

        let order = walk(&[d.clone()]);
        assert_eq!(order.len(), 4);
        let pos = |n: &Node| order.iter().position(|o| o.ptr_eq(n)).unwrap();
        assert!(pos(&a) < pos(&b));
        assert!(pos(&a) < pos(&c));
        assert!(pos(&b) < pos(&d));
        assert!(pos(&c) < pos(&d));
    }

    #[test]
    fn walk_follows_declared_input_order() {
        let x = op("x", vec![]);
        let y = op("y", vec![]);
        let pair = op("pair", vec![("first", x.clone()), ("second", y.clone())]);

        let order = walk(&[pair.clone()]);
        let names: Vec<_> = order.iter().filter_map(Node::op_name).collect();
        assert_eq!(names, ["x", "y", "pair"]);
        assert!(order[2].ptr_eq(&pair));
    }

    #[test]
    fn rewrite_preserves_sharing() {
        let a = op("a", vec![]);
        let b = op("b", vec![("x", a.clone())]);
        let c = op("c", vec![("x", a.clone())]);
        let d = op("d", vec![("l", b), ("r", c)]);

        let out = rewrite(&[d], Descend::Skip, |_, node, _| {
            if node.op_name() == Some("a") {
                Ok(op("a2", vec![]))
            } else {
                Ok(node)
            }
        })
        .unwrap();

        let d2 = out[0].as_op().unwrap();
        let b2 = d2.inputs()["l"].as_op().unwrap();
        let c2 = d2.inputs()["r"].as_op().unwrap();
        assert!(b2.inputs()["x"].ptr_eq(&c2.inputs()["x"]));
        assert_eq!(b2.inputs()["x"].op_name(), Some("a2"));
    }

    #[test]
    fn rewrite_without_changes_returns_same_handles() {
        let a = op("a", vec![]);
        let b = op("b", vec![("x", a)]);
        let out = rewrite(&[b.clone()], Descend::Skip, |_, node, _| Ok(node)).unwrap();
        assert!(out[0].ptr_eq(&b));
    }

    #[test]
    fn rewrite_reports_lambda_depth() {
        let body = op("inner", vec![("x", Node::var(Type::Any, "row"))]);
        let f = Node::lambda([("row", Type::Any)], body);
        let outer = op("map", vec![("arr", op("rows", vec![])), ("fn", f)]);

        let mut depths = HashMap::new();
        rewrite(&[outer], Descend::IntoLambdas, |_, node, depth| {
            if let Some(name) = node.op_name() {
                depths.insert(name.to_string(), depth);
            }
            Ok(node)
        })
        .unwrap();
        assert_eq!(depths["map"], 0);
        assert_eq!(depths["rows"], 0);
        assert_eq!(depths["inner"], 1);
    }

    #[test]
    fn free_vars_respect_binders() {
        let row = Node::var(Type::Any, "row");
        let outer = Node::var(Type::Any, "outer");
        let body = op("pair", vec![("a", row.clone()), ("b", outer.clone())]);
        let f = Node::lambda([("row", Type::Any)], body.clone());

        assert_eq!(
            free_vars(&body),
            ["outer".to_string(), "row".to_string()].into_iter().collect()
        );
        assert_eq!(free_vars(&f), ["outer".to_string()].into_iter().collect());
    }

    #[test]
    fn substitution_honours_shadowing() {
        let row = Node::var(Type::Any, "row");
        let inner = Node::lambda([("row", Type::Any)], op("id", vec![("v", row.clone())]));
        let expr = op("pair", vec![("a", row.clone()), ("f", inner.clone())]);

        let bindings: HashMap<String, Node> =
            [("row".to_string(), Node::literal(5i64))].into_iter().collect();
        let out = substitute_vars(&expr, &bindings);

        let pair = out.as_op().unwrap();
        assert_eq!(pair.inputs()["a"].as_const(), Some(&Value::Int(5)));
        assert!(pair.inputs()["f"].ptr_eq(&inner));
    }

    #[test]
    fn var_dependence_propagates() {
        let row = Node::var(Type::Any, "row");
        let fixed = op("fixed", vec![]);
        let uses = op("uses", vec![("x", row), ("y", fixed.clone())]);
        let dependent = var_dependent(&[uses.clone()]);
        assert!(dependent.contains(&uses.id()));
        assert!(!dependent.contains(&fixed.id()));
    }
}
