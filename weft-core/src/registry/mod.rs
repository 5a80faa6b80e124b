//! Operation registry: names to resolvers and signatures.
//!
//! The compiler resolves every op name against an [`OpRegistry`] during
//! dispatch. A registry answers two questions: what is registered under an
//! exact canonical name, and which definitions share a common (dispatch)
//! name such as `add` for `number-add` and `string-add`.

mod context;
mod inputs;
mod memory;
mod op_def;

pub use context::ResolveContext;
pub use inputs::OpInputs;
pub use memory::MemoryRegistry;
pub use op_def::{
    DeriveTypeFn, OpDef, OpFlags, OpKind, OutputType, Purity, RefineFn, ResolverFn, TagFlow,
};

use std::sync::Arc;

/// Lookup interface consulted by the compiler and the executor.
pub trait OpRegistry: Send + Sync {
    /// Definition registered under an exact canonical name.
    fn lookup(&self, name: &str) -> Option<Arc<OpDef>>;

    /// Definitions sharing a dispatch name, in preference order.
    fn find_candidates(&self, common_name: &str) -> Vec<Arc<OpDef>>;
}
