//! Period Ledger: per-period evidence accumulators.
//!
//! A period materializes on its first attestation; `accumulate` is the only
//! creation path. Accumulators never decrease and `created_at` is written
//! once. `paid` is flipped by the disbursement gate, never here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tranche_types::{AttestationKind, PeriodKey, Timestamp};

use crate::error::GateError;

/// Accumulated delivery evidence for one period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub corridor_hours: u64,
    pub kg_delivered: u64,
    pub paid: bool,
    /// `Timestamp::EPOCH` for a never-seen period
    pub created_at: Timestamp,
}

impl Period {
    pub fn accumulator(&self, kind: AttestationKind) -> u64 {
        match kind {
            AttestationKind::CorridorHours => self.corridor_hours,
            AttestationKind::KgDelivered => self.kg_delivered,
        }
    }

    /// Both thresholds reached (ignores `paid` and suspension).
    pub fn meets(&self, thresholds: &Thresholds) -> bool {
        self.corridor_hours >= thresholds.hours_target && self.kg_delivered >= thresholds.kg_target
    }
}

/// Payout thresholds, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub hours_target: u64,
    pub kg_target: u64,
}

/// Keyed store of period accumulators.
#[derive(Debug, Default)]
pub struct PeriodLedger {
    periods: HashMap<PeriodKey, Period>,
}

impl PeriodLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the accumulator selected by `kind`, creating the
    /// period at `now` if absent.
    ///
    /// Overflow is rejected before anything is written, so a failed call
    /// never creates a period.
    pub fn accumulate(
        &mut self,
        key: PeriodKey,
        kind: AttestationKind,
        value: u64,
        now: Timestamp,
    ) -> Result<Period, GateError> {
        let current = self.periods.get(&key).map(|p| p.accumulator(kind)).unwrap_or(0);
        let updated = current
            .checked_add(value)
            .ok_or(GateError::AccumulatorOverflow { period: key, kind })?;

        let period = self.periods.entry(key).or_insert_with(|| Period {
            created_at: now,
            ..Period::default()
        });
        match kind {
            AttestationKind::CorridorHours => period.corridor_hours = updated,
            AttestationKind::KgDelivered => period.kg_delivered = updated,
        }
        Ok(*period)
    }

    /// Pure read. Zero-valued defaults for a never-seen key; does not create it.
    pub fn get(&self, key: &PeriodKey) -> Period {
        self.periods.get(key).copied().unwrap_or_default()
    }

    pub fn contains(&self, key: &PeriodKey) -> bool {
        self.periods.contains_key(key)
    }

    /// `!paid && thresholds met && !disabled`.
    pub fn is_payable(&self, key: &PeriodKey, thresholds: &Thresholds, disabled: bool) -> bool {
        if disabled {
            return false;
        }
        let period = self.get(key);
        !period.paid && period.meets(thresholds)
    }

    /// Flip `paid` to true. Returns false if the period is absent or already paid.
    pub(crate) fn mark_paid(&mut self, key: &PeriodKey) -> bool {
        match self.periods.get_mut(key) {
            Some(period) if !period.paid => {
                period.paid = true;
                true
            }
            _ => false,
        }
    }

    /// Undo `mark_paid` after a failed transfer.
    pub(crate) fn revert_paid(&mut self, key: &PeriodKey) {
        if let Some(period) = self.periods.get_mut(key) {
            period.paid = false;
        }
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeriodKey, &Period)> {
        self.periods.iter()
    }
}
