//! Disbursement Gate: at most one tranche per period.
//!
//! Payout is an explicit two-step protocol:
//!
//! 1. [`DisbursementGate::authorize`] checks every precondition against the
//!    current state and yields a [`DisbursementTicket`]. Nothing is written.
//! 2. [`DisbursementGate::execute`] commits `paid = true` *before* calling
//!    the value ledger, then transfers. If the transfer fails the commit is
//!    rolled back, so the period stays payable and a later call may retry.
//!
//! The caller must hold the gate's writer lock across both steps.

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tranche_types::{Amount, Identity, PeriodKey};

use crate::error::GateError;
use crate::guard::RoleGuard;
use crate::period::{PeriodLedger, Thresholds};
use crate::traits::ValueLedger;

/// Proof that all preconditions held at authorization time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisbursementTicket {
    period: PeriodKey,
    operator: Identity,
    amount: Amount,
}

/// A completed payout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disbursement {
    pub period: PeriodKey,
    pub operator: Identity,
    pub amount: Amount,
}

/// Payout policy: thresholds plus the fixed tranche amount.
#[derive(Clone, Copy, Debug)]
pub struct DisbursementGate {
    thresholds: Thresholds,
    tranche: Amount,
}

impl DisbursementGate {
    pub fn new(thresholds: Thresholds, tranche: Amount) -> Self {
        Self {
            thresholds,
            tranche,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn tranche(&self) -> Amount {
        self.tranche
    }

    /// Step 1: evaluate preconditions, in order suspension, operator,
    /// already-paid, thresholds.
    pub fn authorize(
        &self,
        guard: &RoleGuard,
        periods: &PeriodLedger,
        disabled: bool,
        period: PeriodKey,
        operator: Identity,
    ) -> Result<DisbursementTicket, GateError> {
        if disabled {
            return Err(GateError::SystemSuspended);
        }
        if !guard.is_allowed_operator(&operator) {
            return Err(GateError::OperatorNotAllowed(operator));
        }

        let current = periods.get(&period);
        if current.paid {
            return Err(GateError::AlreadyPaid(period));
        }
        if !current.meets(&self.thresholds) {
            return Err(GateError::TargetsNotMet {
                period,
                hours: current.corridor_hours,
                hours_target: self.thresholds.hours_target,
                kg: current.kg_delivered,
                kg_target: self.thresholds.kg_target,
            });
        }

        Ok(DisbursementTicket {
            period,
            operator,
            amount: self.tranche,
        })
    }

    /// Step 2: commit `paid`, transfer, roll back on transfer failure.
    pub fn execute(
        &self,
        ticket: DisbursementTicket,
        periods: &mut PeriodLedger,
        ledger: &dyn ValueLedger,
    ) -> Result<Disbursement, GateError> {
        if !periods.mark_paid(&ticket.period) {
            // Ticket was issued against a stale view.
            return Err(GateError::AlreadyPaid(ticket.period));
        }

        if let Err(err) = ledger.transfer_out(&ticket.operator, ticket.amount) {
            periods.revert_paid(&ticket.period);
            error!(
                period = %ticket.period,
                operator = %ticket.operator,
                amount = %ticket.amount,
                error = %err,
                "Tranche transfer FAILED; paid flag rolled back"
            );
            return Err(GateError::TransferFailed(err.to_string()));
        }

        info!(
            period = %ticket.period,
            operator = %ticket.operator,
            amount = %ticket.amount,
            "Tranche disbursed"
        );

        Ok(Disbursement {
            period: ticket.period,
            operator: ticket.operator,
            amount: ticket.amount,
        })
    }
}
