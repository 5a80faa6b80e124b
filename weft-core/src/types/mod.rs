//! Core types for weft.
//!
//! - `NodeId`: process-unique identity of an IR node
//! - `Fingerprint`: content hash of one op invocation, the run-cache key
//! - `Type`: the structural type model checked by the compiler
//! - `TypeOracle`: pluggable `type_of` / `is_assignable` rules

mod data_type;
mod digest;
mod ids;
mod oracle;

pub use data_type::Type;
pub use digest::Digester;
pub use ids::{Fingerprint, NodeId};
pub use oracle::{StructuralOracle, TypeOracle};
