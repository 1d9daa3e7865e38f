use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bytes32;
use crate::error::TypeError;

const IDENTITY_DOMAIN: &[u8] = b"tranche-identity-v1:";

/// An opaque 32-byte caller identity.
///
/// Identities are compared by value only. The gate never interprets the
/// bytes; key management and signature checks happen outside it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity([u8; 32]);

impl Identity {
    /// The null identity. Never a valid guardian, operator or attestor.
    pub const NULL: Identity = Identity([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive an identity from a human-readable label.
    ///
    /// Deterministic: the same label always yields the same identity.
    pub fn derive(label: &str) -> Self {
        Self(bytes32::derive(IDENTITY_DOMAIN, label.as_bytes()))
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex form (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short display form (first 8 bytes hex).
    pub fn short_id(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id:{}", self.short_id())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.short_id())
    }
}

/// Parses either 64 hex characters or `@label` (derived via [`Identity::derive`]).
impl FromStr for Identity {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().strip_prefix('@') {
            Some("") => Err(TypeError::EmptyLabel),
            Some(label) => Ok(Self::derive(label)),
            None => bytes32::decode(s).map(Self),
        }
    }
}

impl TryFrom<String> for Identity {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.to_hex()
    }
}
