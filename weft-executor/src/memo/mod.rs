//! Memoization layers.
//!
//! - [`MemoCache`]: request-scoped, unbounded, keyed by invocation
//!   fingerprint. Fan-out workers carry a copy and merge it back on join.
//! - [`TimeWindowCache`]: cross-request, bounded by capacity and age.

mod request;
mod window;

pub use request::MemoCache;
pub use window::TimeWindowCache;
