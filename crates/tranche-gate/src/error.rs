use std::fmt;

use thiserror::Error;
use tranche_types::{AttestationKind, Identity, PeriodKey, Timestamp, TypeError};

use crate::timelock::{GovernanceAction, GovernanceState};

/// Errors from the Tranche Gate.
///
/// Every rejection is synchronous and leaves state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    // --- Authorization ---
    #[error("caller {0} is not the guardian")]
    NotGuardian(Identity),

    #[error("caller {0} is not an authorized attestor")]
    NotAttestor(Identity),

    #[error("operator {0} is not on the allowlist")]
    OperatorNotAllowed(Identity),

    // --- State ---
    #[error("{0} has already been paid")]
    AlreadyPaid(PeriodKey),

    #[error(
        "targets not met for {period}: {hours}/{hours_target} corridor hours, {kg}/{kg_target} kg"
    )]
    TargetsNotMet {
        period: PeriodKey,
        hours: u64,
        hours_target: u64,
        kg: u64,
        kg_target: u64,
    },

    #[error("cannot {action} while governance is {state}")]
    InvalidGovernanceState {
        state: GovernanceState,
        action: GovernanceAction,
    },

    // --- Validation ---
    #[error("value must be non-zero")]
    ZeroValue,

    #[error("unknown attestation kind: {0}")]
    UnknownKind(String),

    #[error("null identity is not permitted here")]
    InvalidIdentity,

    #[error("malformed hash: expected {expected} bytes, got {actual}")]
    MalformedHash { expected: usize, actual: usize },

    #[error("{kind} accumulator for {period} would overflow")]
    AccumulatorOverflow {
        period: PeriodKey,
        kind: AttestationKind,
    },

    // --- Suspension ---
    #[error("system is suspended")]
    SystemSuspended,

    // --- Timing ---
    #[error("no pending {0} request")]
    NoPendingRequest(GovernanceAction),

    #[error("timelock not elapsed: ready at {ready_at}, now {now}")]
    TimelockNotElapsed { ready_at: Timestamp, now: Timestamp },

    // --- External ---
    #[error("value transfer failed: {0}")]
    TransferFailed(String),

    // --- Configuration ---
    #[error("configuration error: {0}")]
    Config(String),
}

impl GateError {
    /// Taxonomy bucket of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            GateError::NotGuardian(_) | GateError::NotAttestor(_) | GateError::OperatorNotAllowed(_) => {
                ErrorClass::Authorization
            }
            GateError::AlreadyPaid(_)
            | GateError::TargetsNotMet { .. }
            | GateError::InvalidGovernanceState { .. } => ErrorClass::State,
            GateError::ZeroValue
            | GateError::UnknownKind(_)
            | GateError::InvalidIdentity
            | GateError::MalformedHash { .. }
            | GateError::AccumulatorOverflow { .. }
            | GateError::Config(_) => ErrorClass::Validation,
            GateError::SystemSuspended => ErrorClass::Suspension,
            GateError::NoPendingRequest(_) | GateError::TimelockNotElapsed { .. } => {
                ErrorClass::Timing
            }
            GateError::TransferFailed(_) => ErrorClass::External,
        }
    }
}

impl From<TypeError> for GateError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::MalformedHash { expected, actual } => {
                GateError::MalformedHash { expected, actual }
            }
            TypeError::UnknownKind(kind) => GateError::UnknownKind(kind),
            TypeError::EmptyLabel => GateError::InvalidIdentity,
            TypeError::InvalidHex(msg) => GateError::Config(msg),
        }
    }
}

/// Coarse classification of gate errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Wrong caller role
    Authorization,
    /// Wrong FSM state, already paid, thresholds unmet
    State,
    /// Zero value, unknown kind, null identity, malformed hash
    Validation,
    /// System globally disabled
    Suspension,
    /// Timelock not elapsed, no pending request
    Timing,
    /// Value-transfer collaborator reported failure
    External,
}

impl ErrorClass {
    /// Whether the caller can recover by correcting input, waiting or re-trying later.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ErrorClass::External)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Authorization => "authorization",
            ErrorClass::State => "state",
            ErrorClass::Validation => "validation",
            ErrorClass::Suspension => "suspension",
            ErrorClass::Timing => "timing",
            ErrorClass::External => "external",
        };
        f.write_str(s)
    }
}
