use crate::Generator;
use tokenizable_core::RecordId;

/// A deterministic token strategy that ignores the record and counts offsets.
///
/// This generator produces codes like "seq000000", "seq000001", etc. Every
/// record starts from the same first candidate, so it is only collision-free
/// through the assigner's retry loop. Useful for tests and single-writer
/// tooling where predictable tokens matter more than spread.
#[derive(Debug, Clone)]
pub struct SeqGenerator {
    prefix: String,
    start: u64,
}

impl SeqGenerator {
    /// Creates a new sequential generator with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            start: 0,
        }
    }

    /// Creates a new sequential generator whose offset 0 maps to `start`.
    ///
    /// Useful for distributing counter ranges across writers (e.g., writer 1
    /// starts at 0, writer 2 at 1_000_000).
    pub fn with_offset(prefix: impl Into<String>, start: u64) -> Self {
        Self {
            prefix: prefix.into(),
            start,
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self, _discriminator: &RecordId, offset: u64) -> String {
        format!("{}{:06}", self.prefix, self.start.wrapping_add(offset))
    }
}
