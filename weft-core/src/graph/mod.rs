//! Graph intermediate representation.
//!
//! Clients assemble [`Node`]s; nothing executes until the engine compiles and
//! schedules them. Node identity, not structure, decides sharing.

mod node;
mod traversal;

pub use node::{Lambda, Node, NodeKind, Op, OpInputsMap};
pub use traversal::{
    close_over, free_vars, rewrite, substitute_vars, var_dependent, walk, Descend,
};
