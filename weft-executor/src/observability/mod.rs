//! Observability infrastructure for weft.
//!
//! The engine logs through `tracing`: spans around `execute`, `compile`,
//! every compiler pass and every scheduler wave, `debug` events per node and
//! cache hit, `warn` events for dispatch compatibility problems, and one
//! `info` summary of the execution statistics per request. This module
//! installs a subscriber for binaries and tests that want to see them.
//!
//! # Configuration
//!
//! Logging format is controlled via `WEFT_LOG_FORMAT` env var:
//! - `json` - Structured JSON output (for ELK/Loki)
//! - `pretty` - Human-readable colored output (default for TTY)
//! - `compact` - Compact single-line format
//!
//! # Example
//!
//! ```ignore
//! use weft_executor::observability::{TracingConfig, init_tracing};
//!
//! let _guard = init_tracing(TracingConfig::from_env())?;
//!
//! let config = TracingConfig::builder()
//!     .json_format(true)
//!     .log_filter("warn,weft_executor=debug")
//!     .build();
//! let _guard = init_tracing(config)?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder};
pub use tracing_setup::{init_tracing, TracingGuard};

/// Span for one node evaluation.
#[macro_export]
macro_rules! instrument_node {
    ($node_id:expr, $op:expr) => {
        tracing::debug_span!("node", node_id = %$node_id, op = $op)
    };
}
