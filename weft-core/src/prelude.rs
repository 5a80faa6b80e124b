//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! # Example
//!
//! ```
//! use weft_core::prelude::*;
//! ```

// Core types
pub use crate::types::{Digester, Fingerprint, NodeId, StructuralOracle, Type, TypeOracle};

// Error handling
pub use crate::error::{Result, ResultExt, WeftError};

// Graph IR
pub use crate::graph::{Descend, Lambda, Node, NodeKind, Op};

// Values
pub use crate::value::{NodeOutput, TagMap, Value};

// Registry
pub use crate::registry::{
    MemoryRegistry, OpDef, OpFlags, OpInputs, OpKind, OpRegistry, Purity, ResolveContext, TagFlow,
};

// Store
pub use crate::store::{MemoryStore, ObjectRef, ObjectStore, Run, RunHandle, RunState};
