use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Which accumulator an attestation feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationKind {
    /// Hours of corridor operation
    CorridorHours,
    /// Kilograms delivered
    KgDelivered,
}

impl AttestationKind {
    /// Wire tag used by external attestors.
    pub fn tag(&self) -> u8 {
        match self {
            AttestationKind::CorridorHours => 0,
            AttestationKind::KgDelivered => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, TypeError> {
        match tag {
            0 => Ok(AttestationKind::CorridorHours),
            1 => Ok(AttestationKind::KgDelivered),
            other => Err(TypeError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for AttestationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttestationKind::CorridorHours => f.write_str("corridor_hours"),
            AttestationKind::KgDelivered => f.write_str("kg_delivered"),
        }
    }
}

impl FromStr for AttestationKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "corridor_hours" | "CorridorHours" | "hours" => Ok(AttestationKind::CorridorHours),
            "kg_delivered" | "KgDelivered" | "kg" => Ok(AttestationKind::KgDelivered),
            other => Err(TypeError::UnknownKind(other.to_string())),
        }
    }
}
