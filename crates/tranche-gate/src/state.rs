//! Owned gate state.
//!
//! All components live in one struct; every operation receives the caller
//! identity and the current time explicitly. Mutations follow the same
//! shape: guard clauses, mutate, emit exactly one audit record.
//! Synchronization is the caller's job (see [`crate::TrancheGate`]).

use std::sync::Arc;

use tracing::{error, info, warn};
use tranche_types::{Amount, AttestationKind, Identity, PeriodKey, SourceHash, Timestamp};

use crate::anchor::IntegrityAnchor;
use crate::audit::{AuditLog, GateEvent};
use crate::config::GateConfig;
use crate::disbursement::{Disbursement, DisbursementGate};
use crate::error::GateError;
use crate::guard::RoleGuard;
use crate::period::{Period, PeriodLedger, Thresholds};
use crate::timelock::{GovernanceAction, GovernanceState, GovernanceTimelock, PendingRequest};
use crate::traits::{AttestorRegistry, ValueLedger};

pub struct GateState {
    config: GateConfig,
    guard: RoleGuard,
    periods: PeriodLedger,
    disbursements: DisbursementGate,
    governance: GovernanceTimelock,
    anchor: IntegrityAnchor,
    audit: AuditLog,
}

impl GateState {
    pub fn new(config: GateConfig, registry: Arc<dyn AttestorRegistry>) -> Result<Self, GateError> {
        config.validate()?;

        Ok(Self {
            guard: RoleGuard::new(config.guardian, registry)?,
            periods: PeriodLedger::new(),
            disbursements: DisbursementGate::new(config.thresholds(), config.tranche_amount()),
            governance: GovernanceTimelock::new(config.timelock()),
            anchor: IntegrityAnchor::new(config.source_hash),
            audit: AuditLog::new(),
            config,
        })
    }

    // =========================================================================
    // IDENTITY & ROLES
    // =========================================================================

    pub fn is_guardian(&self, caller: &Identity) -> bool {
        self.guard.is_guardian(caller)
    }

    pub fn is_allowed_attestor(&self, caller: &Identity) -> bool {
        self.guard.is_allowed_attestor(caller)
    }

    pub fn is_allowed_operator(&self, identity: &Identity) -> bool {
        self.guard.is_allowed_operator(identity)
    }

    /// Rotate the guardian. Immediate; not timelocked.
    pub fn update_guardian(
        &mut self,
        caller: Identity,
        new_guardian: Identity,
        now: Timestamp,
    ) -> Result<Identity, GateError> {
        self.guard.require_guardian(&caller)?;
        let old = self.guard.rotate_guardian(new_guardian)?;

        warn!(
            old = %old,
            new = %new_guardian,
            "Guardian rotated immediately (no timelock applies to rotation)"
        );
        self.audit.emit(
            now,
            GateEvent::GuardianUpdated {
                old,
                new: new_guardian,
            },
        );
        Ok(old)
    }

    pub fn set_operator(
        &mut self,
        caller: Identity,
        operator: Identity,
        allowed: bool,
        now: Timestamp,
    ) -> Result<(), GateError> {
        self.guard.require_guardian(&caller)?;
        self.guard.set_operator(operator, allowed)?;

        info!(operator = %operator, allowed, "Operator allowlist updated");
        self.audit
            .emit(now, GateEvent::OperatorSet { operator, allowed });
        Ok(())
    }

    /// Advisory announcement of an attestor; the registry is not modified.
    pub fn announce_attestor(
        &mut self,
        caller: Identity,
        attestor: Identity,
        now: Timestamp,
    ) -> Result<bool, GateError> {
        self.guard.require_guardian(&caller)?;
        if attestor.is_null() {
            return Err(GateError::InvalidIdentity);
        }

        let registered = self.guard.registry().is_attestor(&attestor);
        info!(attestor = %attestor, registered, "Attestor announced");
        self.audit.emit(
            now,
            GateEvent::AttestorAnnounced {
                attestor,
                registered,
            },
        );
        Ok(registered)
    }

    // =========================================================================
    // PERIOD LEDGER
    // =========================================================================

    pub fn record_attestation(
        &mut self,
        caller: Identity,
        period: PeriodKey,
        kind: AttestationKind,
        value: u64,
        meta_hash: SourceHash,
        now: Timestamp,
    ) -> Result<Period, GateError> {
        self.guard.require_attestor(&caller)?;
        if self.governance.is_disabled() {
            return Err(GateError::SystemSuspended);
        }
        if value == 0 {
            return Err(GateError::ZeroValue);
        }

        let updated = self.periods.accumulate(period, kind, value, now)?;

        info!(
            period = %period,
            kind = %kind,
            value,
            total = updated.accumulator(kind),
            attestor = %caller,
            "Attestation recorded"
        );
        self.audit.emit(
            now,
            GateEvent::Attested {
                period,
                kind,
                value,
                meta_hash,
                attestor: caller,
            },
        );
        Ok(updated)
    }

    pub fn is_payable(&self, period: &PeriodKey) -> bool {
        self.periods.is_payable(
            period,
            self.disbursements.thresholds(),
            self.governance.is_disabled(),
        )
    }

    /// Zero-valued defaults for a never-seen key.
    pub fn get_period(&self, period: &PeriodKey) -> Period {
        self.periods.get(period)
    }

    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    // =========================================================================
    // DISBURSEMENT
    // =========================================================================

    pub fn disburse(
        &mut self,
        period: PeriodKey,
        operator: Identity,
        ledger: &dyn ValueLedger,
        now: Timestamp,
    ) -> Result<Disbursement, GateError> {
        let ticket = self.disbursements.authorize(
            &self.guard,
            &self.periods,
            self.governance.is_disabled(),
            period,
            operator,
        )?;
        let paid = self.disbursements.execute(ticket, &mut self.periods, ledger)?;

        self.audit.emit(
            now,
            GateEvent::Disbursed {
                period: paid.period,
                operator: paid.operator,
                amount: paid.amount,
            },
        );
        Ok(paid)
    }

    /// Pull funds into the pool. Permitted while suspended.
    pub fn deposit(
        &mut self,
        from: Identity,
        amount: Amount,
        ledger: &dyn ValueLedger,
        now: Timestamp,
    ) -> Result<(), GateError> {
        if amount == 0 {
            return Err(GateError::ZeroValue);
        }
        if from.is_null() {
            return Err(GateError::InvalidIdentity);
        }
        if let Err(err) = ledger.transfer_in(&from, amount) {
            error!(
                from = %from,
                amount = %amount,
                error = %err,
                "Deposit transfer FAILED"
            );
            return Err(GateError::TransferFailed(err.to_string()));
        }

        info!(from = %from, amount = %amount, "Deposit received");
        self.audit.emit(now, GateEvent::Deposited { from, amount });
        Ok(())
    }

    // =========================================================================
    // GOVERNANCE TIMELOCK
    // =========================================================================

    pub fn request_disable(
        &mut self,
        caller: Identity,
        now: Timestamp,
    ) -> Result<PendingRequest, GateError> {
        self.request(caller, GovernanceAction::Disable, now)
    }

    pub fn finalize_disable(&mut self, caller: Identity, now: Timestamp) -> Result<(), GateError> {
        self.finalize(caller, GovernanceAction::Disable, now)
    }

    pub fn request_enable(
        &mut self,
        caller: Identity,
        now: Timestamp,
    ) -> Result<PendingRequest, GateError> {
        self.request(caller, GovernanceAction::Enable, now)
    }

    pub fn finalize_enable(&mut self, caller: Identity, now: Timestamp) -> Result<(), GateError> {
        self.finalize(caller, GovernanceAction::Enable, now)
    }

    fn request(
        &mut self,
        caller: Identity,
        action: GovernanceAction,
        now: Timestamp,
    ) -> Result<PendingRequest, GateError> {
        self.guard.require_guardian(&caller)?;
        let replaced = self.governance.pending();
        let request = self.governance.request(action, now)?;

        info!(
            action = %action,
            requested_at = request.requested_at.as_secs(),
            ready_at = request.ready_at.as_secs(),
            wait_secs = self.governance.delay().as_secs(),
            restarted = replaced.is_some(),
            "Governance request opened"
        );
        let event = match action {
            GovernanceAction::Disable => GateEvent::DisableRequested {
                requested_at: request.requested_at,
                ready_at: request.ready_at,
            },
            GovernanceAction::Enable => GateEvent::EnableRequested {
                requested_at: request.requested_at,
                ready_at: request.ready_at,
            },
        };
        self.audit.emit(now, event);
        Ok(request)
    }

    fn finalize(
        &mut self,
        caller: Identity,
        action: GovernanceAction,
        now: Timestamp,
    ) -> Result<(), GateError> {
        self.guard.require_guardian(&caller)?;
        self.governance.finalize(action, now)?;

        info!(action = %action, state = %self.governance.state(), "Governance request finalized");
        let event = match action {
            GovernanceAction::Disable => GateEvent::Disabled,
            GovernanceAction::Enable => GateEvent::Enabled,
        };
        self.audit.emit(now, event);
        Ok(())
    }

    pub fn governance_state(&self) -> GovernanceState {
        self.governance.state()
    }

    pub fn pending_request(&self) -> Option<PendingRequest> {
        self.governance.pending()
    }

    pub fn is_disabled(&self) -> bool {
        self.governance.is_disabled()
    }

    // =========================================================================
    // INTEGRITY ANCHOR
    // =========================================================================

    pub fn set_source_hash(
        &mut self,
        caller: Identity,
        hash: SourceHash,
        now: Timestamp,
    ) -> Result<SourceHash, GateError> {
        self.guard.require_guardian(&caller)?;
        let previous = self.anchor.set(hash);

        info!(hash = %hash, setter = %caller, "Source hash updated");
        self.audit.emit(
            now,
            GateEvent::SourceHashSet {
                hash,
                setter: caller,
            },
        );
        Ok(previous)
    }

    pub fn source_hash(&self) -> SourceHash {
        self.anchor.source_hash()
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn guardian(&self) -> Identity {
        self.guard.guardian()
    }

    pub fn allowed_operators(&self) -> Vec<Identity> {
        self.guard.allowed_operators()
    }

    pub fn thresholds(&self) -> Thresholds {
        *self.disbursements.thresholds()
    }

    pub fn tranche(&self) -> Amount {
        self.disbursements.tranche()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}
