use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bytes32;
use crate::error::TypeError;

/// Fixed-length reference hash published for external artifact verification.
///
/// The gate never recomputes it; only the length is validated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceHash([u8; 32]);

impl SourceHash {
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build from an arbitrary byte slice, rejecting anything but 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        <[u8; 32]>::try_from(bytes)
            .map(Self)
            .map_err(|_| TypeError::MalformedHash {
                expected: Self::LEN,
                actual: bytes.len(),
            })
    }

    /// blake3 digest of an artifact.
    pub fn digest(artifact: &[u8]) -> Self {
        Self(*blake3::hash(artifact).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SourceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SourceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceHash({})", hex::encode(&self.0[..8]))
    }
}

impl FromStr for SourceHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        bytes32::decode(s).map(Self)
    }
}

impl TryFrom<String> for SourceHash {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceHash> for String {
    fn from(hash: SourceHash) -> Self {
        hash.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_enforces_length() {
        assert!(SourceHash::from_slice(&[7u8; 32]).is_ok());
        assert_eq!(
            SourceHash::from_slice(&[7u8; 31]),
            Err(TypeError::MalformedHash {
                expected: 32,
                actual: 31
            })
        );
    }

    #[test]
    fn parse_rejects_truncated_hex() {
        let err = "abcd".parse::<SourceHash>().unwrap_err();
        assert_eq!(
            err,
            TypeError::MalformedHash {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn digest_matches_blake3() {
        let h = SourceHash::digest(b"release-1.0.tar.gz");
        assert_eq!(h.as_bytes(), blake3::hash(b"release-1.0.tar.gz").as_bytes());
    }
}
