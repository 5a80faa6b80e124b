//! Content references.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a persisted value.
///
/// References are content-addressed: saving equal values yields equal
/// references, whatever name they were saved under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRef(String);

impl ObjectRef {
    /// Reference a value by its content digest.
    pub fn for_value(value: &Value) -> Self {
        Self(value.digest())
    }

    /// Wrap an existing digest.
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// The content digest.
    pub fn digest(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.0.chars().take(12).collect();
        write!(f, "obj_{}", short)
    }
}
