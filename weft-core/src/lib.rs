//! Weft Core Library
//!
//! This crate provides the data model and collaborator interfaces of the
//! weft lazy dataflow engine.
//!
//! # Overview
//!
//! Client code builds an immutable expression graph of [`Node`]s wired
//! together by named operation calls. Nothing runs while the graph is built;
//! the `weft-executor` crate compiles, schedules and executes it, reusing
//! previously computed results whenever an equivalent invocation has already
//! run.
//!
//! # Key Components
//!
//! - **Graph**: nodes, ops, lambdas and identity-preserving rewrites
//! - **Value**: runtime values, out-of-band tags and node outputs
//! - **Types**: the structural type model and the type oracle
//! - **Registry**: op definitions, resolvers and dispatch lookup
//! - **Store**: content-addressed objects and the run ledger
//!
//! # Example
//!
//! ```
//! use weft_core::prelude::*;
//!
//! let a = Node::literal(3i64);
//! let b = Node::output(Type::Int, "add", [("lhs", a.clone()), ("rhs", Node::literal(4i64))]);
//! assert_eq!(b.to_string(), "add(3, 4)");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod graph;
pub mod prelude;
pub mod registry;
pub mod store;
pub mod types;
pub mod value;

// Re-export key types at crate root for convenience
pub use error::{Result, WeftError};
pub use graph::{Lambda, Node, NodeKind, Op};
pub use registry::{OpDef, OpInputs, OpRegistry, ResolveContext};
pub use store::{ObjectRef, ObjectStore, RunHandle, RunState};
pub use types::{Fingerprint, NodeId, Type};
pub use value::{NodeOutput, TagMap, Value};
