use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bytes32;
use crate::error::TypeError;

const PERIOD_DOMAIN: &[u8] = b"tranche-period-v1:";

/// Opaque fixed-length identifier for a delivery period.
///
/// Callers choose the key; typically it is derived from a calendar label
/// such as `"2025-W01"` via [`PeriodKey::from_label`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey([u8; 32]);

impl PeriodKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_label(label: &str) -> Self {
        Self(bytes32::derive(PERIOD_DOMAIN, label.as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "period:{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeriodKey({})", hex::encode(&self.0[..8]))
    }
}

/// Parses 64 hex characters, or `@label` for a label-derived key.
impl FromStr for PeriodKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().strip_prefix('@') {
            Some("") => Err(TypeError::EmptyLabel),
            Some(label) => Ok(Self::from_label(label)),
            None => bytes32::decode(s).map(Self),
        }
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_hex()
    }
}
