use tranche_types::SourceHash;

/// Integrity Anchor: the current reference hash for external verifiers.
///
/// Only the current value is kept; earlier values live in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityAnchor {
    source_hash: SourceHash,
}

impl IntegrityAnchor {
    pub fn new(initial: SourceHash) -> Self {
        Self {
            source_hash: initial,
        }
    }

    pub fn source_hash(&self) -> SourceHash {
        self.source_hash
    }

    /// Unconditional overwrite; returns the previous value.
    pub fn set(&mut self, hash: SourceHash) -> SourceHash {
        std::mem::replace(&mut self.source_hash, hash)
    }
}
