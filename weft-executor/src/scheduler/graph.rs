//! Forward graph construction.

use std::collections::{BTreeSet, HashMap, HashSet};
use weft_core::error::{Result, WeftError};
use weft_core::graph::{walk, Node, NodeKind};
use weft_core::types::NodeId;
use weft_core::value::NodeOutput;

/// A pending output node and the nodes waiting on it.
#[derive(Debug)]
pub(crate) struct ForwardNode {
    pub(crate) node: Node,
    /// Arena indices of consumers.
    pub(crate) dependents: BTreeSet<usize>,
    /// Inputs that still have no result.
    pending: usize,
}

/// Arena of the output nodes a request still has to execute.
///
/// Const and void nodes are always ready and are not wrapped; nodes that
/// already have a result are treated the same way.
#[derive(Debug, Default)]
pub(crate) struct ForwardGraph {
    nodes: Vec<ForwardNode>,
    index: HashMap<NodeId, usize>,
}

impl ForwardGraph {
    /// Wire up every output node reachable from `terminals` that is not in
    /// `done`. Lambda bodies are not entered.
    pub(crate) fn build(terminals: &[Node], done: &HashMap<NodeId, NodeOutput>) -> Result<Self> {
        let order = walk(terminals);

        // consumers come after their inputs in `order`; sweep backwards to
        // find what the terminals actually need
        let mut needed: HashSet<NodeId> = terminals.iter().map(Node::id).collect();
        for node in order.iter().rev() {
            if !needed.contains(&node.id()) || done.contains_key(&node.id()) {
                continue;
            }
            if let Some(op) = node.as_op() {
                needed.extend(op.input_nodes().map(Node::id));
            }
        }

        let mut graph = Self::default();
        for node in order {
            if !needed.contains(&node.id()) || done.contains_key(&node.id()) {
                continue;
            }
            let op = match node.kind() {
                NodeKind::Output(op) => op,
                NodeKind::Var(name) => {
                    return Err(WeftError::UnboundVariable { name: name.clone() });
                }
                _ => continue,
            };

            let upstream: BTreeSet<usize> = op
                .input_nodes()
                .filter_map(|input| graph.index.get(&input.id()).copied())
                .collect();
            let at = graph.nodes.len();
            for &input in &upstream {
                graph.nodes[input].dependents.insert(at);
            }
            graph.index.insert(node.id(), at);
            graph.nodes.push(ForwardNode {
                node,
                dependents: BTreeSet::new(),
                pending: upstream.len(),
            });
        }
        Ok(graph)
    }

    /// Number of nodes to execute.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Node at an arena index.
    pub(crate) fn node(&self, at: usize) -> &Node {
        &self.nodes[at].node
    }

    /// Nodes whose inputs are all ready from the start.
    pub(crate) fn roots(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&at| self.nodes[at].pending == 0)
            .collect()
    }

    /// Record that the node at `at` has a result; returns the dependents
    /// that just became ready.
    pub(crate) fn complete(&mut self, at: usize) -> Vec<usize> {
        let dependents: Vec<usize> = self.nodes[at].dependents.iter().copied().collect();
        dependents
            .into_iter()
            .filter(|&dep| {
                let entry = &mut self.nodes[dep];
                entry.pending -= 1;
                entry.pending == 0
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::types::Type;

    fn add(lhs: &Node, rhs: &Node) -> Node {
        Node::output(Type::Int, "add", [("lhs", lhs.clone()), ("rhs", rhs.clone())])
    }

    #[test]
    fn diamond_has_one_entry_per_output_node() {
        let a = Node::literal(3i64);
        let b = add(&a, &Node::literal(4i64));
        let c = add(&a, &Node::literal(5i64));
        let d = add(&b, &c);

        let mut graph = ForwardGraph::build(&[d.clone()], &HashMap::new()).unwrap();
        assert_eq!(graph.len(), 3);

        let roots = graph.roots();
        assert_eq!(roots.len(), 2);
        assert!(graph.complete(roots[0]).is_empty());
        let ready = graph.complete(roots[1]);
        assert_eq!(ready.len(), 1);
        assert!(graph.node(ready[0]).ptr_eq(&d));
    }

    #[test]
    fn done_nodes_and_their_inputs_are_skipped() {
        let b = add(&Node::literal(1i64), &Node::literal(2i64));
        let c = add(&b, &Node::literal(3i64));
        let mut done = HashMap::new();
        done.insert(b.id(), NodeOutput::new(3i64));

        let graph = ForwardGraph::build(&[c.clone()], &done).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.roots(), vec![0]);
    }

    #[test]
    fn unbound_variables_are_rejected() {
        let n = add(&Node::var(Type::Int, "row"), &Node::literal(1i64));
        let err = ForwardGraph::build(&[n], &HashMap::new()).unwrap_err();
        assert!(matches!(err, WeftError::UnboundVariable { name } if name == "row"));
    }

    #[test]
    fn inputs_bound_twice_count_once() {
        let a = add(&Node::literal(1i64), &Node::literal(1i64));
        let twice = add(&a, &a);
        let mut graph = ForwardGraph::build(&[twice], &HashMap::new()).unwrap();
        let roots = graph.roots();
        assert_eq!(roots.len(), 1);
        assert_eq!(graph.complete(roots[0]).len(), 1);
    }
}
