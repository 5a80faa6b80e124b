//! Error types for weft.
//!
//! Every variant carries a stable code prefix (`E1xx` compile, `E2xx` typing,
//! `E3xx` resolver, `E5xx` store, `E6xx` async runs, `E8xx` configuration) so
//! that log lines can be grepped and alerts keyed without parsing prose.

use crate::types::Fingerprint;
use thiserror::Error;

/// The main error type for weft operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeftError {
    // =========================================================================
    // Compile Errors (E100-E199)
    // =========================================================================
    /// The graph references an operation name that no registry knows.
    #[error("E101: Unknown operation '{op}'")]
    UnknownOperation {
        /// The operation name as written by the caller.
        op: String,
    },

    /// Candidates exist for the name but none accepts the input types.
    #[error("E102: No dispatch candidate for '{op}' accepts inputs ({arg_types})")]
    NoMatchingDispatch {
        /// The operation name as written by the caller.
        op: String,
        /// Rendered input types that failed to match.
        arg_types: String,
    },

    /// A variable node reached the scheduler without a binding.
    #[error("E103: Unbound variable '{name}'")]
    UnboundVariable {
        /// Variable name.
        name: String,
    },

    /// Structural problem with the graph handed to the engine.
    #[error("E104: Invalid graph: {cause}")]
    InvalidGraph {
        /// Description of the problem.
        cause: String,
    },

    // =========================================================================
    // Typing / Input Errors (E200-E299)
    // =========================================================================
    /// A resolver asked for an input that was not bound.
    #[error("E201: Operation '{op}' has no input named '{input}'")]
    MissingInput {
        /// Operation being resolved.
        op: String,
        /// Missing input name.
        input: String,
    },

    /// An input value did not have the shape a resolver expected.
    #[error("E202: Input '{input}' expected {expected}, got {actual}")]
    InputType {
        /// Input name.
        input: String,
        /// Expected shape.
        expected: String,
        /// Actual shape.
        actual: String,
    },

    // =========================================================================
    // Resolver Errors (E300-E399)
    // =========================================================================
    /// A resolver body failed.
    #[error("E301: Operation '{op}' failed: {cause}")]
    Resolver {
        /// Operation that failed.
        op: String,
        /// Reason for the failure.
        cause: String,
    },

    /// A resolver panicked on a worker thread.
    #[error("E302: Operation '{op}' panicked: {message}")]
    ResolverPanic {
        /// Operation that panicked.
        op: String,
        /// The panic payload, when it was a string.
        message: String,
    },

    // =========================================================================
    // Store Errors (E500-E599)
    // =========================================================================
    /// No object is stored under the reference.
    #[error("E501: Object '{reference}' not found in store")]
    ObjectNotFound {
        /// The reference that failed to resolve.
        reference: String,
    },

    /// No run is recorded for the fingerprint.
    #[error("E502: Run {fingerprint} not found in ledger")]
    RunNotFound {
        /// The fingerprint that was looked up.
        fingerprint: Fingerprint,
    },

    /// Backend-specific store failure.
    #[error("E503: Store error: {cause}")]
    Store {
        /// Description of the failure.
        cause: String,
    },

    // =========================================================================
    // Async Run Errors (E600-E699)
    // =========================================================================
    /// A background run finished in the failed state.
    #[error("E601: Async run {fingerprint} failed: {cause}")]
    AsyncRunFailed {
        /// Fingerprint of the failed run.
        fingerprint: Fingerprint,
        /// Failure reported by the worker.
        cause: String,
    },

    /// The background worker pool could not accept work.
    #[error("E602: Background worker unavailable: {cause}")]
    WorkerUnavailable {
        /// Reason the worker could not be used.
        cause: String,
    },

    // =========================================================================
    // Configuration Errors (E800-E899)
    // =========================================================================
    /// Invalid configuration value.
    #[error("E801: Invalid configuration '{field}': {cause}")]
    Config {
        /// The configuration field with the invalid value.
        field: String,
        /// Why the value is invalid.
        cause: String,
    },

    /// Serialization/deserialization error.
    #[error("E802: Serialization error: {0}")]
    Serialization(
        /// The serialization error message.
        String,
    ),
}

impl WeftError {
    /// Get the error code (e.g., "E101").
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownOperation { .. } => "E101",
            Self::NoMatchingDispatch { .. } => "E102",
            Self::UnboundVariable { .. } => "E103",
            Self::InvalidGraph { .. } => "E104",
            Self::MissingInput { .. } => "E201",
            Self::InputType { .. } => "E202",
            Self::Resolver { .. } => "E301",
            Self::ResolverPanic { .. } => "E302",
            Self::ObjectNotFound { .. } => "E501",
            Self::RunNotFound { .. } => "E502",
            Self::Store { .. } => "E503",
            Self::AsyncRunFailed { .. } => "E601",
            Self::WorkerUnavailable { .. } => "E602",
            Self::Config { .. } => "E801",
            Self::Serialization(_) => "E802",
        }
    }

    /// Whether the error is raised while compiling, before any node executes.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownOperation { .. }
                | Self::NoMatchingDispatch { .. }
                | Self::UnboundVariable { .. }
                | Self::InvalidGraph { .. }
        )
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::WorkerUnavailable { .. })
    }

    /// Build a resolver error.
    pub fn resolver(op: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Resolver {
            op: op.into(),
            cause: cause.into(),
        }
    }
}

/// Result type alias for weft operations.
pub type Result<T> = std::result::Result<T, WeftError>;

/// Extension trait for converting foreign errors inside resolvers.
pub trait ResultExt<T> {
    /// Convert the error into a [`WeftError::Resolver`] for `op`.
    fn with_op(self, op: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn with_op(self, op: &str) -> Result<T> {
        self.map_err(|e| WeftError::Resolver {
            op: op.to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_correct() {
        let err = WeftError::UnknownOperation {
            op: "number-frobnicate".to_string(),
        };
        assert_eq!(err.code(), "E101");

        let err = WeftError::AsyncRunFailed {
            fingerprint: Fingerprint::from_hex("abc"),
            cause: "boom".to_string(),
        };
        assert_eq!(err.code(), "E601");
    }

    #[test]
    fn error_display() {
        let err = WeftError::NoMatchingDispatch {
            op: "add".to_string(),
            arg_types: "string, int".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("E102"));
        assert!(msg.contains("string, int"));
    }

    #[test]
    fn compile_errors() {
        assert!(WeftError::UnknownOperation { op: "x".into() }.is_compile_error());
        assert!(!WeftError::resolver("x", "failed").is_compile_error());
    }

    #[test]
    fn with_op_wraps_foreign_errors() {
        let parsed: std::result::Result<i64, _> = "nope".parse::<i64>();
        let err = parsed.with_op("number-parse").unwrap_err();
        assert!(matches!(err, WeftError::Resolver { ref op, .. } if op == "number-parse"));
    }
}
