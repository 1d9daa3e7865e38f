use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tranche_types::{Amount, Identity};

use crate::traits::{AttestorRegistry, TransferError, ValueLedger};

/// In-memory value ledger.
///
/// Tracks balances per identity; the gate's pool is just another account.
/// Can be told to refuse outbound transfers to exercise failure paths.
pub struct InMemoryValueLedger {
    pool: Identity,
    balances: RwLock<HashMap<Identity, Amount>>,
    refuse_outbound: RwLock<bool>,
}

impl InMemoryValueLedger {
    pub fn new(pool: Identity) -> Self {
        Self {
            pool,
            balances: RwLock::new(HashMap::new()),
            refuse_outbound: RwLock::new(false),
        }
    }

    /// Credit an external account (mints, for funding test payers).
    pub fn fund(&self, who: Identity, amount: Amount) {
        let mut balances = self.balances.write();
        let entry = balances.entry(who).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Make subsequent `transfer_out` calls fail (or succeed again).
    pub fn set_refuse_outbound(&self, refuse: bool) {
        *self.refuse_outbound.write() = refuse;
    }

    fn move_value(&self, from: Identity, to: Identity, amount: Amount) -> Result<(), TransferError> {
        let mut balances = self.balances.write();
        let available = balances.get(&from).copied().unwrap_or(0);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        balances.insert(from, available - amount);
        let dest = balances.entry(to).or_insert(0);
        *dest = dest.saturating_add(amount);
        Ok(())
    }
}

impl ValueLedger for InMemoryValueLedger {
    fn transfer_out(&self, to: &Identity, amount: Amount) -> Result<(), TransferError> {
        if *self.refuse_outbound.read() {
            return Err(TransferError::Rejected("outbound transfers disabled".into()));
        }
        self.move_value(self.pool, *to, amount)
    }

    fn transfer_in(&self, from: &Identity, amount: Amount) -> Result<(), TransferError> {
        self.move_value(*from, self.pool, amount)
    }

    fn balance_of(&self, who: &Identity) -> Amount {
        self.balances.read().get(who).copied().unwrap_or(0)
    }
}

/// Attestor registry backed by a fixed set.
#[derive(Default)]
pub struct StaticAttestorRegistry {
    attestors: RwLock<HashSet<Identity>>,
}

impl StaticAttestorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attestors(attestors: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            attestors: RwLock::new(attestors.into_iter().collect()),
        }
    }

    pub fn register(&self, attestor: Identity) {
        self.attestors.write().insert(attestor);
    }

    pub fn deregister(&self, attestor: &Identity) {
        self.attestors.write().remove(attestor);
    }
}

impl AttestorRegistry for StaticAttestorRegistry {
    fn is_attestor(&self, identity: &Identity) -> bool {
        self.attestors.read().contains(identity)
    }
}
