use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tranche_types::{Amount, AttestationKind, Identity, PeriodKey, SourceHash, Timestamp};

use crate::audit::AuditRecord;
use crate::clock::Clock;
use crate::config::GateConfig;
use crate::disbursement::Disbursement;
use crate::error::{ErrorClass, GateError};
use crate::period::{Period, Thresholds};
use crate::state::GateState;
use crate::timelock::{GovernanceState, PendingRequest};
use crate::traits::{AttestorRegistry, ValueLedger};

/// Point-in-time view of the gate, taken under a single read lock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSnapshot {
    pub at: Timestamp,
    pub guardian: Identity,
    pub governance: GovernanceState,
    pub pending: Option<PendingRequest>,
    pub source_hash: SourceHash,
    pub thresholds: Thresholds,
    pub tranche: Amount,
    pub period_count: usize,
    pub audit_len: usize,
    pub pool_balance: Amount,
}

/// The Tranche Gate service.
///
/// Wraps [`GateState`] behind a single-writer lock. Every mutating call
/// holds the write lock from its first guard clause until its audit record
/// is appended, so no reader observes a half-applied operation. Queries
/// share the read lock.
///
/// The value ledger is called while the write lock is held; it must not
/// call back into the gate.
pub struct TrancheGate {
    state: RwLock<GateState>,
    clock: Arc<dyn Clock>,
    ledger: Arc<dyn ValueLedger>,
}

impl TrancheGate {
    pub fn new(
        config: GateConfig,
        registry: Arc<dyn AttestorRegistry>,
        ledger: Arc<dyn ValueLedger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GateError> {
        let state = GateState::new(config, registry)?;
        info!(
            guardian = %state.guardian(),
            hours_target = state.thresholds().hours_target,
            kg_target = state.thresholds().kg_target,
            tranche = %state.tranche(),
            "Tranche gate initialized"
        );
        Ok(Self {
            state: RwLock::new(state),
            clock,
            ledger,
        })
    }

    // ── identity & roles ─────────────────────────────────────────────

    pub fn is_guardian(&self, caller: &Identity) -> bool {
        self.state.read().is_guardian(caller)
    }

    pub fn is_allowed_attestor(&self, caller: &Identity) -> bool {
        self.state.read().is_allowed_attestor(caller)
    }

    pub fn is_allowed_operator(&self, identity: &Identity) -> bool {
        self.state.read().is_allowed_operator(identity)
    }

    pub fn update_guardian(&self, caller: Identity, new_guardian: Identity) -> Result<Identity, GateError> {
        let now = self.clock.now();
        let result = self.state.write().update_guardian(caller, new_guardian, now);
        rejected("update_guardian", &caller, result)
    }

    pub fn set_operator(&self, caller: Identity, operator: Identity, allowed: bool) -> Result<(), GateError> {
        let now = self.clock.now();
        let result = self.state.write().set_operator(caller, operator, allowed, now);
        rejected("set_operator", &caller, result)
    }

    /// Returns whether the registry currently recognizes `attestor`.
    pub fn announce_attestor(&self, caller: Identity, attestor: Identity) -> Result<bool, GateError> {
        let now = self.clock.now();
        let result = self.state.write().announce_attestor(caller, attestor, now);
        rejected("announce_attestor", &caller, result)
    }

    // ── period ledger ────────────────────────────────────────────────

    pub fn record_attestation(
        &self,
        caller: Identity,
        period: PeriodKey,
        kind: AttestationKind,
        value: u64,
        meta_hash: SourceHash,
    ) -> Result<Period, GateError> {
        let now = self.clock.now();
        let result = self
            .state
            .write()
            .record_attestation(caller, period, kind, value, meta_hash, now);
        rejected("record_attestation", &caller, result)
    }

    /// Attestation with the kind given as its wire tag (0 = hours, 1 = kg).
    pub fn record_attestation_tagged(
        &self,
        caller: Identity,
        period: PeriodKey,
        tag: u8,
        value: u64,
        meta_hash: SourceHash,
    ) -> Result<Period, GateError> {
        match AttestationKind::from_tag(tag) {
            Ok(kind) => self.record_attestation(caller, period, kind, value, meta_hash),
            Err(err) => rejected("record_attestation", &caller, Err(err.into())),
        }
    }

    pub fn is_payable(&self, period: &PeriodKey) -> bool {
        let payable = self.state.read().is_payable(period);
        debug!(period = %period, payable, "Payability queried");
        payable
    }

    pub fn get_period(&self, period: &PeriodKey) -> Period {
        self.state.read().get_period(period)
    }

    // ── disbursement ─────────────────────────────────────────────────

    /// Pay the fixed tranche for `period` to `operator`.
    ///
    /// Callable by anyone; the recipient must be an allowed operator.
    pub fn disburse(&self, period: PeriodKey, operator: Identity) -> Result<Disbursement, GateError> {
        let now = self.clock.now();
        let result = self
            .state
            .write()
            .disburse(period, operator, self.ledger.as_ref(), now);
        rejected_payout(&period, &operator, result)
    }

    pub fn deposit(&self, from: Identity, amount: Amount) -> Result<(), GateError> {
        let now = self.clock.now();
        let result = self
            .state
            .write()
            .deposit(from, amount, self.ledger.as_ref(), now);
        rejected("deposit", &from, result)
    }

    pub fn pool_balance(&self) -> Amount {
        let pool = self.state.read().config().pool_account;
        self.ledger.balance_of(&pool)
    }

    // ── governance timelock ──────────────────────────────────────────

    pub fn request_disable(&self, caller: Identity) -> Result<PendingRequest, GateError> {
        let now = self.clock.now();
        let result = self.state.write().request_disable(caller, now);
        rejected("request_disable", &caller, result)
    }

    pub fn finalize_disable(&self, caller: Identity) -> Result<(), GateError> {
        let now = self.clock.now();
        let result = self.state.write().finalize_disable(caller, now);
        rejected("finalize_disable", &caller, result)
    }

    pub fn request_enable(&self, caller: Identity) -> Result<PendingRequest, GateError> {
        let now = self.clock.now();
        let result = self.state.write().request_enable(caller, now);
        rejected("request_enable", &caller, result)
    }

    pub fn finalize_enable(&self, caller: Identity) -> Result<(), GateError> {
        let now = self.clock.now();
        let result = self.state.write().finalize_enable(caller, now);
        rejected("finalize_enable", &caller, result)
    }

    pub fn governance_state(&self) -> GovernanceState {
        self.state.read().governance_state()
    }

    pub fn pending_request(&self) -> Option<PendingRequest> {
        self.state.read().pending_request()
    }

    pub fn is_disabled(&self) -> bool {
        self.state.read().is_disabled()
    }

    // ── integrity anchor ─────────────────────────────────────────────

    pub fn set_source_hash(&self, caller: Identity, hash: SourceHash) -> Result<SourceHash, GateError> {
        let now = self.clock.now();
        let result = self.state.write().set_source_hash(caller, hash, now);
        rejected("set_source_hash", &caller, result)
    }

    /// Set the anchor from raw bytes; anything but 32 bytes is rejected.
    pub fn set_source_hash_bytes(&self, caller: Identity, bytes: &[u8]) -> Result<SourceHash, GateError> {
        match SourceHash::from_slice(bytes) {
            Ok(hash) => self.set_source_hash(caller, hash),
            Err(err) => rejected("set_source_hash", &caller, Err(err.into())),
        }
    }

    pub fn source_hash(&self) -> SourceHash {
        self.state.read().source_hash()
    }

    // ── accessors & audit ────────────────────────────────────────────

    pub fn guardian(&self) -> Identity {
        self.state.read().guardian()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.state.read().thresholds()
    }

    pub fn tranche(&self) -> Amount {
        self.state.read().tranche()
    }

    pub fn config(&self) -> GateConfig {
        self.state.read().config().clone()
    }

    pub fn period_count(&self) -> usize {
        self.state.read().period_count()
    }

    pub fn allowed_operators(&self) -> Vec<Identity> {
        self.state.read().allowed_operators()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Live feed of audit records appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditRecord> {
        self.state.read().audit().subscribe()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.state.read().audit().records().to_vec()
    }

    /// Records with `sequence > after`.
    pub fn records_since(&self, after: u64) -> Vec<AuditRecord> {
        self.state.read().audit().records_since(after).to_vec()
    }

    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.state.read();
        GateSnapshot {
            at: self.clock.now(),
            guardian: state.guardian(),
            governance: state.governance_state(),
            pending: state.pending_request(),
            source_hash: state.source_hash(),
            thresholds: state.thresholds(),
            tranche: state.tranche(),
            period_count: state.period_count(),
            audit_len: state.audit().len(),
            pool_balance: self.ledger.balance_of(&state.config().pool_account),
        }
    }
}

/// Log a rejected operation. Transfer failures are already logged at
/// error where the transfer is attempted.
fn rejected<T>(op: &'static str, caller: &Identity, result: Result<T, GateError>) -> Result<T, GateError> {
    if let Err(err) = &result {
        if err.class() != ErrorClass::External {
            warn!(
                op,
                caller = %caller,
                class = %err.class(),
                error = %err,
                "Operation rejected"
            );
        }
    }
    result
}

/// `disburse` is callable by anyone, so the recipient is logged instead
/// of a caller.
fn rejected_payout<T>(
    period: &PeriodKey,
    operator: &Identity,
    result: Result<T, GateError>,
) -> Result<T, GateError> {
    if let Err(err) = &result {
        if err.class() != ErrorClass::External {
            warn!(
                op = "disburse",
                period = %period,
                operator = %operator,
                class = %err.class(),
                error = %err,
                "Operation rejected"
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::mocks::{InMemoryValueLedger, StaticAttestorRegistry};

    fn gate() -> (TrancheGate, Arc<ManualClock>) {
        let config = GateConfig::default();
        let clock = Arc::new(ManualClock::new(Timestamp(1_000)));
        let ledger = Arc::new(InMemoryValueLedger::new(config.pool_account));
        let registry = Arc::new(StaticAttestorRegistry::with_attestors([Identity::derive("attestor")]));
        let gate = TrancheGate::new(config, registry, ledger, clock.clone()).unwrap();
        (gate, clock)
    }

    /// Shared buffer that a `fmt` subscriber writes log lines into.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` with WARN-and-above logging captured on this thread.
    fn with_captured_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8_lossy(&logs.0.lock()).into_owned();
        (out, text)
    }

    #[test]
    fn refused_deposit_is_logged_at_error() {
        let (gate, _) = gate();
        let broke = Identity::derive("broke");

        let (result, logs) = with_captured_logs(|| gate.deposit(broke, 50));
        assert!(matches!(result, Err(GateError::TransferFailed(_))));
        assert!(logs.contains("ERROR"), "logs: {logs}");
        assert!(logs.contains("Deposit transfer FAILED"), "logs: {logs}");
        assert!(logs.contains(&format!("from={broke}")), "logs: {logs}");
        assert!(gate.records().is_empty());
    }

    #[test]
    fn zero_deposit_warns_without_attestation_wording() {
        let (gate, _) = gate();
        let (result, logs) = with_captured_logs(|| gate.deposit(Identity::derive("funder"), 0));
        assert_eq!(result, Err(GateError::ZeroValue));
        assert!(logs.contains("WARN"), "logs: {logs}");
        assert!(logs.contains("value must be non-zero"), "logs: {logs}");
        assert!(!logs.contains("attestation"), "logs: {logs}");
    }

    #[test]
    fn rejected_payout_names_operator_not_caller() {
        let (gate, _) = gate();
        let stranger = Identity::derive("stranger");
        let period = PeriodKey::from_label("p");

        let (result, logs) = with_captured_logs(|| gate.disburse(period, stranger));
        assert_eq!(result, Err(GateError::OperatorNotAllowed(stranger)));
        assert!(logs.contains(&format!("operator={stranger}")), "logs: {logs}");
        assert!(logs.contains(&format!("period={period}")), "logs: {logs}");
        assert!(!logs.contains("caller="), "logs: {logs}");
    }

    #[test]
    fn unknown_tag_is_rejected_without_side_effects() {
        let (gate, _) = gate();
        let result = gate.record_attestation_tagged(
            Identity::derive("attestor"),
            PeriodKey::from_label("p"),
            2,
            5,
            SourceHash::default(),
        );
        assert_eq!(result, Err(GateError::UnknownKind("2".into())));
        assert_eq!(gate.period_count(), 0);
        assert!(gate.records().is_empty());
    }

    #[test]
    fn tagged_attestation_maps_to_kind() {
        let (gate, _) = gate();
        let period = gate
            .record_attestation_tagged(
                Identity::derive("attestor"),
                PeriodKey::from_label("p"),
                1,
                750,
                SourceHash::default(),
            )
            .unwrap();
        assert_eq!(period.kg_delivered, 750);
        assert_eq!(period.corridor_hours, 0);
    }

    #[test]
    fn short_source_hash_is_malformed() {
        let (gate, _) = gate();
        let guardian = gate.guardian();
        assert_eq!(
            gate.set_source_hash_bytes(guardian, &[7u8; 31]),
            Err(GateError::MalformedHash {
                expected: 32,
                actual: 31
            })
        );
        let accepted = gate.set_source_hash_bytes(guardian, &[7u8; 32]);
        assert!(accepted.is_ok());
        assert_eq!(gate.source_hash().as_bytes(), &[7u8; 32]);
    }

    #[test]
    fn records_are_stamped_with_clock_time() {
        let (gate, clock) = gate();
        let guardian = gate.guardian();
        clock.set(Timestamp(5_000));
        let request = gate.request_disable(guardian).unwrap();
        assert_eq!(request.requested_at, Timestamp(5_000));
        assert_eq!(request.ready_at, Timestamp(5_000 + 259_200));

        let records = gate.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].at, Timestamp(5_000));
        assert_eq!(records[0].sequence, 1);
    }

    #[test]
    fn snapshot_is_consistent() {
        let (gate, _) = gate();
        let snap = gate.snapshot();
        assert_eq!(snap.governance, GovernanceState::Enabled);
        assert_eq!(snap.pending, None);
        assert_eq!(snap.period_count, 0);
        assert_eq!(snap.audit_len, 0);
        assert_eq!(snap.pool_balance, 0);
        assert_eq!(snap.tranche, 1_000_000_000);
    }
}
