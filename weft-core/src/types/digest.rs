//! Incremental sha256 helper used for fingerprints and content references.

use sha2::{Digest, Sha256};

/// Length-prefixed sha256 accumulator.
///
/// Each field is written with its byte length first so that
/// `("ab", "c")` and `("a", "bc")` never collide.
#[derive(Clone, Default)]
pub struct Digester {
    hasher: Sha256,
}

impl Digester {
    /// Start a digest under a domain label.
    pub fn new(domain: &str) -> Self {
        let mut digester = Self::default();
        digester.field(domain);
        digester
    }

    /// Append one string field.
    pub fn field(&mut self, value: &str) -> &mut Self {
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    /// Finish and return the lowercase hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}
