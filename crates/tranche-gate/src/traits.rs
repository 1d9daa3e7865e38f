use thiserror::Error;
use tranche_types::{Amount, Identity};

/// Failure reported by the value ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// External value ledger that executes transfers for the gate's pool.
///
/// Implementations must not call back into the gate: the gate holds its
/// writer lock for the duration of a transfer.
pub trait ValueLedger: Send + Sync {
    /// Move `amount` out of the pool to `to`.
    fn transfer_out(&self, to: &Identity, amount: Amount) -> Result<(), TransferError>;

    /// Pull `amount` from `from` into the pool.
    fn transfer_in(&self, from: &Identity, amount: Amount) -> Result<(), TransferError>;

    fn balance_of(&self, who: &Identity) -> Amount;
}

/// External attestor registry.
pub trait AttestorRegistry: Send + Sync {
    fn is_attestor(&self, identity: &Identity) -> bool;
}
