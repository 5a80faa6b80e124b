//! Graph IR nodes.

use crate::types::{Digester, NodeId, Type};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Ordered input bindings of an op.
pub type OpInputsMap = IndexMap<String, Node>;

/// An invocation descriptor: op name plus bound input nodes.
///
/// Not executable by itself; the name is resolved against the registry.
#[derive(Debug, Clone)]
pub struct Op {
    name: String,
    inputs: OpInputsMap,
}

impl Op {
    /// Create an op.
    pub fn new(name: impl Into<String>, inputs: OpInputsMap) -> Self {
        Self {
            name: name.into(),
            inputs,
        }
    }

    /// Op name as written (common or canonical).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered input bindings.
    pub fn inputs(&self) -> &OpInputsMap {
        &self.inputs
    }

    /// Input nodes in order.
    pub fn input_nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.inputs.values()
    }
}

/// The four node shapes.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Result of invoking an op.
    Output(Op),
    /// A literal, possibly a function value.
    Const(Value),
    /// Free variable bound by an enclosing lambda.
    Var(String),
    /// Sentinel for "no node".
    Void,
}

#[derive(Debug)]
struct NodeInner {
    id: NodeId,
    ty: Type,
    kind: NodeKind,
}

/// Immutable IR node handle.
///
/// Cloning shares the node: clones keep the same [`NodeId`], and the scheduler
/// executes a shared node once. Separately constructed nodes never merge,
/// even when structurally equal.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl Node {
    fn build(ty: Type, kind: NodeKind) -> Self {
        Self(Arc::new(NodeInner {
            id: NodeId::next(),
            ty,
            kind,
        }))
    }

    /// Output node; constructing it executes nothing.
    pub fn output<I, K>(ty: Type, op_name: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = (K, Node)>,
        K: Into<String>,
    {
        let inputs = inputs.into_iter().map(|(k, n)| (k.into(), n)).collect();
        Self::build(ty, NodeKind::Output(Op::new(op_name, inputs)))
    }

    /// Output node from an already built op.
    pub fn from_op(ty: Type, op: Op) -> Self {
        Self::build(ty, NodeKind::Output(op))
    }

    /// Literal with an explicit type.
    pub fn constant(ty: Type, value: impl Into<Value>) -> Self {
        Self::build(ty, NodeKind::Const(value.into()))
    }

    /// Literal typed from its value.
    pub fn literal(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::build(value.type_of(), NodeKind::Const(value))
    }

    /// Free variable.
    pub fn var(ty: Type, name: impl Into<String>) -> Self {
        Self::build(ty, NodeKind::Var(name.into()))
    }

    /// The void sentinel.
    pub fn void() -> Self {
        Self::build(Type::Null, NodeKind::Void)
    }

    /// Function-valued literal.
    pub fn lambda<I, K>(params: I, body: Node) -> Self
    where
        I: IntoIterator<Item = (K, Type)>,
        K: Into<String>,
    {
        let lambda = Lambda::new(params, body);
        Self::build(lambda.ty(), NodeKind::Const(Value::Function(lambda)))
    }

    /// Identity of this node.
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Declared or refined type.
    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    /// Node shape.
    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// The op, for output nodes.
    pub fn as_op(&self) -> Option<&Op> {
        match &self.0.kind {
            NodeKind::Output(op) => Some(op),
            _ => None,
        }
    }

    /// The op name, for output nodes.
    pub fn op_name(&self) -> Option<&str> {
        self.as_op().map(Op::name)
    }

    /// The literal, for const nodes.
    pub fn as_const(&self) -> Option<&Value> {
        match &self.0.kind {
            NodeKind::Const(value) => Some(value),
            _ => None,
        }
    }

    /// The lambda, for function-valued const nodes.
    pub fn as_lambda(&self) -> Option<&Lambda> {
        self.as_const().and_then(Value::as_lambda)
    }

    /// Whether this is an output node.
    pub fn is_output(&self) -> bool {
        matches!(self.0.kind, NodeKind::Output(_))
    }

    /// Whether this node is the same handle as `other`.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Same shape under a new type; yields a new identity.
    pub fn with_type(&self, ty: Type) -> Node {
        Self::build(ty, self.0.kind.clone())
    }

    /// Structural digest of the subtree.
    ///
    /// Used as the content reference of function values. Shared subgraphs
    /// are hashed once.
    pub fn digest(&self) -> String {
        let mut memo = HashMap::new();
        digest_node(self, &mut memo)
    }
}

fn digest_node(node: &Node, memo: &mut HashMap<NodeId, String>) -> String {
    if let Some(hit) = memo.get(&node.id()) {
        return hit.clone();
    }
    let mut d = Digester::new("node");
    d.field(&node.ty().to_string());
    match node.kind() {
        NodeKind::Output(op) => {
            d.field("out").field(op.name());
            for (name, input) in op.inputs() {
                let child = digest_node(input, memo);
                d.field(name).field(&child);
            }
        }
        NodeKind::Const(value) => {
            d.field("const").field(&value.digest());
        }
        NodeKind::Var(name) => {
            d.field("var").field(name);
        }
        NodeKind::Void => {
            d.field("void");
        }
    }
    let out = d.finish();
    memo.insert(node.id(), out.clone());
    out
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.0.id)
            .field("ty", &self.0.ty)
            .field("expr", &format_args!("{}", self))
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            NodeKind::Output(op) => {
                write!(f, "{}(", op.name())?;
                for (i, input) in op.input_nodes().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", input)?;
                }
                write!(f, ")")
            }
            NodeKind::Const(Value::Function(lambda)) => write!(f, "{}", lambda),
            NodeKind::Const(value) => write!(f, "{}", value),
            NodeKind::Var(name) => write!(f, "{}", name),
            NodeKind::Void => write!(f, "void"),
        }
    }
}

/// A function value: named parameters over a body subgraph.
#[derive(Debug, Clone)]
pub struct Lambda {
    params: Vec<(String, Type)>,
    body: Node,
}

impl Lambda {
    /// Create a lambda.
    pub fn new<I, K>(params: I, body: Node) -> Self
    where
        I: IntoIterator<Item = (K, Type)>,
        K: Into<String>,
    {
        Self {
            params: params.into_iter().map(|(k, t)| (k.into(), t)).collect(),
            body,
        }
    }

    /// Parameters in call order.
    pub fn params(&self) -> &[(String, Type)] {
        &self.params
    }

    /// Parameter names in call order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(name, _)| name.as_str())
    }

    /// The body.
    pub fn body(&self) -> &Node {
        &self.body
    }

    /// Same parameters over a different body.
    pub fn with_body(&self, body: Node) -> Self {
        Self {
            params: self.params.clone(),
            body,
        }
    }

    /// Function type of the lambda.
    pub fn ty(&self) -> Type {
        Type::Function {
            inputs: self.params.clone(),
            output: Box::new(self.body.ty().clone()),
        }
    }

    /// Structural digest of parameters and body.
    pub fn digest(&self) -> String {
        let mut d = Digester::new("lambda");
        for (name, ty) in &self.params {
            d.field(name).field(&ty.to_string());
        }
        d.field(&self.body.digest());
        d.finish()
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, name) in self.param_names().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", name)?;
        }
        write!(f, ") => {}", self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(lhs: &Node, rhs: &Node) -> Node {
        Node::output(Type::Int, "add", [("lhs", lhs.clone()), ("rhs", rhs.clone())])
    }

    #[test]
    fn clones_share_identity() {
        let a = Node::literal(3i64);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn equal_structure_is_not_equal_identity() {
        let a = add(&Node::literal(1i64), &Node::literal(2i64));
        let b = add(&Node::literal(1i64), &Node::literal(2i64));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn display_renders_expression() {
        let a = Node::literal(3i64);
        let n = add(&a, &Node::var(Type::Int, "row"));
        assert_eq!(n.to_string(), "add(3, row)");
        let f = Node::lambda([("row", Type::Int)], n);
        assert_eq!(f.to_string(), "(row) => add(3, row)");
    }

    #[test]
    fn lambda_type_follows_body() {
        let body = Node::output(Type::String, "to-string", [("v", Node::var(Type::Int, "x"))]);
        let f = Node::lambda([("x", Type::Int)], body);
        assert_eq!(f.ty(), &Type::function([("x", Type::Int)], Type::String));
    }

    #[test]
    fn with_type_gets_new_identity() {
        let n = add(&Node::literal(1i64), &Node::literal(2i64));
        let m = n.with_type(Type::Number);
        assert_ne!(n.id(), m.id());
        assert_eq!(m.ty(), &Type::Number);
        assert_eq!(m.op_name(), Some("add"));
    }
}
