//! End-to-end scenarios through the `TrancheGate` service.

use std::sync::Arc;
use std::time::Duration;

use tranche_gate::*;

const TIMELOCK: u64 = 259_200;
const TRANCHE: Amount = 1_000_000_000;

struct Harness {
    gate: Arc<TrancheGate>,
    clock: Arc<ManualClock>,
    ledger: Arc<InMemoryValueLedger>,
    guardian: Identity,
    attestor: Identity,
    operator: Identity,
}

fn harness() -> Harness {
    let config = GateConfig {
        guardian: Identity::derive("guardian"),
        ..GateConfig::default()
    };
    let attestor = Identity::derive("attestor");
    let operator = Identity::derive("operator-x");

    let clock = Arc::new(ManualClock::new(Timestamp(0)));
    let ledger = Arc::new(InMemoryValueLedger::new(config.pool_account));
    ledger.fund(config.pool_account, 10 * TRANCHE);
    let registry = Arc::new(StaticAttestorRegistry::with_attestors([attestor]));

    let gate = TrancheGate::new(config.clone(), registry, ledger.clone(), clock.clone()).unwrap();
    gate.set_operator(config.guardian, operator, true).unwrap();

    Harness {
        gate: Arc::new(gate),
        clock,
        ledger,
        guardian: config.guardian,
        attestor,
        operator,
    }
}

fn attest(h: &Harness, period: PeriodKey, kind: AttestationKind, value: u64) -> Result<Period, GateError> {
    h.gate
        .record_attestation(h.attestor, period, kind, value, SourceHash::digest(b"evidence"))
}

#[test]
fn payout_after_both_targets_then_already_paid() {
    let h = harness();
    let p = PeriodKey::from_label("2024-W01");

    attest(&h, p, AttestationKind::CorridorHours, 60).unwrap();
    assert!(!h.gate.is_payable(&p));

    attest(&h, p, AttestationKind::KgDelivered, 1_500_000).unwrap();
    assert!(h.gate.is_payable(&p));

    let paid = h.gate.disburse(p, h.operator).unwrap();
    assert_eq!(paid.amount, TRANCHE);
    assert_eq!(
        h.gate.records().last().unwrap().event,
        GateEvent::Disbursed {
            period: p,
            operator: h.operator,
            amount: TRANCHE,
        }
    );
    assert!(h.gate.get_period(&p).paid);
    assert!(!h.gate.is_payable(&p));
    assert_eq!(h.ledger.balance_of(&h.operator), TRANCHE);

    let recorded = h.gate.records().len();
    assert_eq!(h.gate.disburse(p, h.operator), Err(GateError::AlreadyPaid(p)));
    assert_eq!(h.ledger.balance_of(&h.operator), TRANCHE);
    assert_eq!(h.gate.records().len(), recorded);
}

#[test]
fn suspension_lifecycle() {
    let h = harness();
    let p = PeriodKey::from_label("2024-W02");
    attest(&h, p, AttestationKind::CorridorHours, 60).unwrap();
    attest(&h, p, AttestationKind::KgDelivered, 1_500_000).unwrap();

    h.clock.set(Timestamp(0));
    h.gate.request_disable(h.guardian).unwrap();

    h.clock.set(Timestamp(TIMELOCK - 1));
    assert!(matches!(
        h.gate.finalize_disable(h.guardian),
        Err(GateError::TimelockNotElapsed { .. })
    ));
    assert!(!h.gate.is_disabled());

    h.clock.set(Timestamp(TIMELOCK));
    h.gate.finalize_disable(h.guardian).unwrap();
    assert_eq!(h.gate.governance_state(), GovernanceState::Disabled);

    assert_eq!(
        attest(&h, p, AttestationKind::CorridorHours, 1),
        Err(GateError::SystemSuspended)
    );
    assert_eq!(h.gate.disburse(p, h.operator), Err(GateError::SystemSuspended));
    assert!(!h.gate.is_payable(&p));

    // Deposits still flow while suspended.
    let funder = Identity::derive("funder");
    h.ledger.fund(funder, 5);
    h.gate.deposit(funder, 5).unwrap();
    assert_eq!(
        h.gate.records().last().unwrap().event,
        GateEvent::Deposited {
            from: funder,
            amount: 5
        }
    );

    let request = h.gate.request_enable(h.guardian).unwrap();
    assert_eq!(request.ready_at, Timestamp(2 * TIMELOCK));
    h.clock.advance(Duration::from_secs(TIMELOCK - 1));
    assert!(h.gate.finalize_enable(h.guardian).is_err());
    assert_eq!(h.gate.disburse(p, h.operator), Err(GateError::SystemSuspended));

    h.clock.advance(Duration::from_secs(1));
    h.gate.finalize_enable(h.guardian).unwrap();
    assert_eq!(h.gate.governance_state(), GovernanceState::Enabled);
    h.gate.disburse(p, h.operator).unwrap();
}

#[test]
fn targets_not_met_in_either_order() {
    let h = harness();
    let a = PeriodKey::from_label("a");
    let b = PeriodKey::from_label("b");

    attest(&h, a, AttestationKind::KgDelivered, 1_500_000).unwrap();
    attest(&h, b, AttestationKind::CorridorHours, 60).unwrap();

    for key in [a, b] {
        assert!(matches!(
            h.gate.disburse(key, h.operator),
            Err(GateError::TargetsNotMet { .. })
        ));
        assert!(!h.gate.get_period(&key).paid);
    }
}

#[test]
fn disallowed_operator_rejected_before_anything_else() {
    let h = harness();
    let p = PeriodKey::from_label("p");
    let stranger = Identity::derive("stranger");

    assert_eq!(
        h.gate.disburse(p, stranger),
        Err(GateError::OperatorNotAllowed(stranger))
    );
    assert_eq!(
        h.gate.disburse(p, Identity::NULL),
        Err(GateError::OperatorNotAllowed(Identity::NULL))
    );

    h.gate.set_operator(h.guardian, h.operator, false).unwrap();
    assert_eq!(
        h.gate.disburse(p, h.operator),
        Err(GateError::OperatorNotAllowed(h.operator))
    );
}

#[test]
fn failed_transfer_rolls_back_and_can_be_retried() {
    let h = harness();
    let p = PeriodKey::from_label("retry");
    attest(&h, p, AttestationKind::CorridorHours, 60).unwrap();
    attest(&h, p, AttestationKind::KgDelivered, 1_500_000).unwrap();
    let before = h.gate.records().len();

    h.ledger.set_refuse_outbound(true);
    assert!(matches!(
        h.gate.disburse(p, h.operator),
        Err(GateError::TransferFailed(_))
    ));
    assert!(!h.gate.get_period(&p).paid);
    assert!(h.gate.is_payable(&p));
    assert_eq!(h.gate.records().len(), before);

    h.ledger.set_refuse_outbound(false);
    h.gate.disburse(p, h.operator).unwrap();
    assert!(h.gate.get_period(&p).paid);
}

#[test]
fn rejected_calls_leave_no_audit_trace() {
    let h = harness();
    let mallory = Identity::derive("mallory");
    let before = h.gate.records();

    let _ = h.gate.request_disable(mallory);
    let _ = h.gate.set_source_hash(mallory, SourceHash::digest(b"evil"));
    let _ = h.gate.update_guardian(mallory, mallory);
    let _ = h.gate.record_attestation(
        mallory,
        PeriodKey::from_label("p"),
        AttestationKind::CorridorHours,
        10,
        SourceHash::default(),
    );
    let _ = h.gate.finalize_enable(h.guardian);

    assert_eq!(h.gate.records(), before);
    assert_eq!(h.gate.guardian(), h.guardian);
}

#[test]
fn guardian_rotation_is_audited_with_both_identities() {
    let h = harness();
    let successor = Identity::derive("guardian-2");

    assert_eq!(h.gate.update_guardian(h.guardian, successor), Ok(h.guardian));
    let record = h.gate.records().last().cloned().unwrap();
    assert_eq!(
        record.event,
        GateEvent::GuardianUpdated {
            old: h.guardian,
            new: successor,
        }
    );
    assert_eq!(h.gate.guardian(), successor);
    assert!(h.gate.request_disable(h.guardian).is_err());
    assert!(h.gate.request_disable(successor).is_ok());
}

#[test]
fn wrong_state_requests_are_rejected() {
    let h = harness();
    assert_eq!(
        h.gate.request_enable(h.guardian),
        Err(GateError::InvalidGovernanceState {
            state: GovernanceState::Enabled,
            action: GovernanceAction::Enable,
        })
    );
    assert_eq!(
        h.gate.finalize_disable(h.guardian),
        Err(GateError::NoPendingRequest(GovernanceAction::Disable))
    );
}

#[test]
fn audit_sequence_is_gap_free() {
    let h = harness();
    let p = PeriodKey::from_label("seq");
    attest(&h, p, AttestationKind::CorridorHours, 60).unwrap();
    let _ = h.gate.disburse(p, h.operator);
    attest(&h, p, AttestationKind::KgDelivered, 1_500_000).unwrap();
    h.gate.disburse(p, h.operator).unwrap();

    let records = h.gate.records();
    let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, (1..=records.len() as u64).collect::<Vec<_>>());
    assert_eq!(
        records.last().unwrap().event,
        GateEvent::Disbursed {
            period: p,
            operator: h.operator,
            amount: TRANCHE,
        }
    );

    let tail = h.gate.records_since(records.len() as u64 - 1);
    assert_eq!(tail.len(), 1);
}

#[tokio::test]
async fn subscribers_see_records_in_order() {
    let h = harness();
    let mut rx = h.gate.subscribe();
    let p = PeriodKey::from_label("live");

    let gate = h.gate.clone();
    let attestor = h.attestor;
    tokio::task::spawn_blocking(move || {
        gate.record_attestation(attestor, p, AttestationKind::CorridorHours, 60, SourceHash::default())
            .unwrap();
        gate.record_attestation(attestor, p, AttestationKind::KgDelivered, 1_500_000, SourceHash::default())
            .unwrap();
    })
    .await
    .unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert!(second.sequence > first.sequence);
    assert!(matches!(
        second.event,
        GateEvent::Attested {
            kind: AttestationKind::KgDelivered,
            ..
        }
    ));
}

#[test]
fn concurrent_disbursements_pay_once() {
    let h = harness();
    let p = PeriodKey::from_label("race");
    attest(&h, p, AttestationKind::CorridorHours, 60).unwrap();
    attest(&h, p, AttestationKind::KgDelivered, 1_500_000).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gate = h.gate.clone();
            let operator = h.operator;
            std::thread::spawn(move || gate.disburse(p, operator).is_ok())
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|t| t.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(h.ledger.balance_of(&h.operator), TRANCHE);
}
