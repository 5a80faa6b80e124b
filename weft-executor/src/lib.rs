//! Weft Executor - compile, schedule and execute weft graphs.
//!
//! This crate provides the engine behind the weft data model:
//! - Four-pass compiler (dispatch, column pushdown, coercion, refinement)
//! - Forward-graph wave scheduler with a request-wide result store
//! - Fingerprinted run cache on top of the store's run ledger
//! - Background workers for async ops
//! - Budgeted fan-out map with static folding
//! - Request memo and cross-request type cache
//! - Execution statistics, strict type diagnostics and tracing setup

#![warn(missing_docs)]

mod builtins;
mod cache;
mod compiler;
pub mod config;
mod context;
pub mod engine;
pub mod fanout;
pub mod memo;
pub mod observability;
mod scheduler;
mod scope;
pub mod stats;
mod worker;

pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use fanout::ParallelBudget;
pub use stats::{Diagnostic, DiagnosticKind, ExecutionStats, OpStats};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, EngineBuilder};
    pub use crate::fanout::ParallelBudget;
    pub use crate::memo::{MemoCache, TimeWindowCache};
    pub use crate::observability::{init_tracing, LogFormat, TracingConfig, TracingGuard};
    pub use crate::stats::{Diagnostic, DiagnosticKind, ExecutionStats, OpStats};
    pub use weft_core::prelude::*;
}
