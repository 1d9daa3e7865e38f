use thiserror::Error;

/// Errors raised while parsing or constructing shared types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("malformed hash: expected {expected} bytes, got {actual}")]
    MalformedHash { expected: usize, actual: usize },

    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("unknown attestation kind: {0}")]
    UnknownKind(String),

    #[error("empty identity label")]
    EmptyLabel,
}
