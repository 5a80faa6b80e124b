//! Column pushdown for table reads.
//!
//! When a `table-rows` read appears in the graph, a forward analysis
//! records which row fields every consumer reads, and the read is replaced
//! by `table-rows_with_columns` carrying only those names. Graphs without
//! the read are returned untouched.

use std::collections::{BTreeSet, HashMap};
use tracing::instrument;
use weft_core::error::Result;
use weft_core::graph::{free_vars, rewrite, walk, Descend, Lambda, Node, NodeKind, Op};
use weft_core::types::{NodeId, Type};
use weft_core::value::Value;

pub(crate) const TABLE_READ_OP: &str = "table-rows";
pub(crate) const PROJECTED_READ_OP: &str = "table-rows_with_columns";
pub(crate) const COLUMNS_INPUT: &str = "columns";

const FIELD_ACCESS_OPS: &[&str] = &["pick", "getattr"];
const PASSTHROUGH_OPS: &[&str] = &["index", "limit", "offset", "filter", "sort"];
const ROW_LAMBDA_OPS: &[&str] = &["map", "filter", "sort"];

/// Which fields of a value its consumers read.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Access {
    All,
    Fields(BTreeSet<String>),
}

impl Access {
    fn none() -> Self {
        Access::Fields(BTreeSet::new())
    }

    fn field(name: &str) -> Self {
        Access::Fields(BTreeSet::from([name.to_string()]))
    }

    fn merge(&mut self, other: Access) {
        match other {
            Access::All => *self = Access::All,
            Access::Fields(theirs) => {
                if let Access::Fields(mine) = self {
                    mine.extend(theirs);
                }
            }
        }
    }
}

#[instrument(skip_all, fields(roots = nodes.len()))]
pub(super) fn pushdown_pass(nodes: &[Node]) -> Result<Vec<Node>> {
    let order = walk(nodes);
    if !order.iter().any(|n| n.op_name() == Some(TABLE_READ_OP)) {
        return Ok(nodes.to_vec());
    }

    let access = stitch(nodes, &order);
    rewrite(nodes, Descend::Skip, |original, node, _| {
        if node.op_name() != Some(TABLE_READ_OP) {
            return Ok(node);
        }
        match access.get(&original.id()) {
            Some(Access::Fields(columns)) if !columns.is_empty() => Ok(project(&node, columns)),
            _ => Ok(node),
        }
    })
}

/// Walk consumers before producers and accumulate each node's access set.
fn stitch(roots: &[Node], order: &[Node]) -> HashMap<NodeId, Access> {
    let mut access: HashMap<NodeId, Access> = HashMap::new();
    for root in roots {
        access.insert(root.id(), Access::All);
    }

    for node in order.iter().rev() {
        let Some(op) = node.as_op() else {
            continue;
        };
        let mine = access.get(&node.id()).cloned().unwrap_or(Access::All);
        let common = common_name(op.name());
        for (position, input) in op.input_nodes().enumerate() {
            let demand = input_demand(op, common, position, &mine);
            access
                .entry(input.id())
                .and_modify(|seen| seen.merge(demand.clone()))
                .or_insert(demand);
        }
    }
    access
}

/// What the op at `common` needs from its input at `position`.
fn input_demand(op: &Op, common: &str, position: usize, mine: &Access) -> Access {
    if position != 0 {
        return Access::All;
    }
    if FIELD_ACCESS_OPS.contains(&common) {
        return match const_key(op) {
            Some(key) => Access::field(key),
            None => Access::All,
        };
    }
    if common == "count" {
        return Access::none();
    }

    let mut demand = if PASSTHROUGH_OPS.contains(&common) {
        mine.clone()
    } else if ROW_LAMBDA_OPS.contains(&common) {
        Access::none()
    } else {
        return Access::All;
    };
    if ROW_LAMBDA_OPS.contains(&common) {
        match op.input_nodes().nth(1).and_then(Node::as_lambda) {
            Some(lambda) => demand.merge(row_access(lambda)),
            None => demand = Access::All,
        }
    }
    demand
}

fn const_key(op: &Op) -> Option<&str> {
    op.input_nodes()
        .nth(1)
        .and_then(Node::as_const)
        .and_then(Value::as_str)
}

/// Fields of the row parameter a per-row lambda reads.
fn row_access(lambda: &Lambda) -> Access {
    let Some(row) = lambda.param_names().next() else {
        return Access::none();
    };
    let is_row = |n: &Node| matches!(n.kind(), NodeKind::Var(name) if name == row);
    if is_row(lambda.body()) {
        return Access::All;
    }

    let mut access = Access::none();
    for node in walk(std::slice::from_ref(lambda.body())) {
        match node.kind() {
            NodeKind::Output(op) => {
                let common = common_name(op.name());
                for (position, input) in op.input_nodes().enumerate() {
                    if !is_row(input) {
                        continue;
                    }
                    let key = const_key(op).filter(|_| position == 0 && FIELD_ACCESS_OPS.contains(&common));
                    match key {
                        Some(key) => access.merge(Access::field(key)),
                        None => return Access::All,
                    }
                }
            }
            NodeKind::Const(Value::Function(_)) if free_vars(&node).contains(row) => {
                return Access::All;
            }
            _ => {}
        }
    }
    access
}

fn project(read: &Node, columns: &BTreeSet<String>) -> Node {
    let mut inputs = read.as_op().map(|op| op.inputs().clone()).unwrap_or_default();
    let names: Vec<Value> = columns.iter().map(|c| Value::string(c.as_str())).collect();
    inputs.insert(
        COLUMNS_INPUT.to_string(),
        Node::constant(Type::list(Type::String), Value::List(names)),
    );
    tracing::debug!(columns = ?columns, "Projected table read");
    Node::from_op(read.ty().clone(), Op::new(PROJECTED_READ_OP, inputs))
}

fn common_name(name: &str) -> &str {
    name.rsplit_once('-').map_or(name, |(_, common)| common)
}
