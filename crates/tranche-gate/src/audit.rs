//! Append-only audit channel.
//!
//! Every successful mutation produces exactly one [`AuditRecord`]. Records are
//! kept in an in-memory log and fanned out to subscribers (external indexers,
//! dashboards) over a broadcast channel. Rejected operations produce nothing.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use tranche_types::{Amount, AttestationKind, Identity, PeriodKey, SourceHash, Timestamp};

/// Default capacity of the subscriber broadcast buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Audit events emitted by the gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateEvent {
    Deposited {
        from: Identity,
        amount: Amount,
    },
    /// Advisory only; the registry itself lives outside the gate.
    AttestorAnnounced {
        attestor: Identity,
        registered: bool,
    },
    Attested {
        period: PeriodKey,
        kind: AttestationKind,
        value: u64,
        meta_hash: SourceHash,
        attestor: Identity,
    },
    OperatorSet {
        operator: Identity,
        allowed: bool,
    },
    Disbursed {
        period: PeriodKey,
        operator: Identity,
        amount: Amount,
    },
    SourceHashSet {
        hash: SourceHash,
        setter: Identity,
    },
    DisableRequested {
        requested_at: Timestamp,
        ready_at: Timestamp,
    },
    Disabled,
    EnableRequested {
        requested_at: Timestamp,
        ready_at: Timestamp,
    },
    Enabled,
    GuardianUpdated {
        old: Identity,
        new: Identity,
    },
}

impl GateEvent {
    /// Stable short name, used as the `type` tag and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            GateEvent::Deposited { .. } => "deposited",
            GateEvent::AttestorAnnounced { .. } => "attestor_announced",
            GateEvent::Attested { .. } => "attested",
            GateEvent::OperatorSet { .. } => "operator_set",
            GateEvent::Disbursed { .. } => "disbursed",
            GateEvent::SourceHashSet { .. } => "source_hash_set",
            GateEvent::DisableRequested { .. } => "disable_requested",
            GateEvent::Disabled => "disabled",
            GateEvent::EnableRequested { .. } => "enable_requested",
            GateEvent::Enabled => "enabled",
            GateEvent::GuardianUpdated { .. } => "guardian_updated",
        }
    }
}

/// One entry in the audit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: uuid::Uuid,
    /// Gap-free, starting at 1
    pub sequence: u64,
    pub at: Timestamp,
    pub event: GateEvent,
}

/// Append-only audit log with broadcast fan-out.
///
/// Not internally synchronized: it lives inside the gate state and is only
/// appended to under the gate's writer lock.
pub struct AuditLog {
    records: Vec<AuditRecord>,
    sender: broadcast::Sender<AuditRecord>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            records: Vec::new(),
            sender,
        }
    }

    /// Append an event and notify subscribers.
    pub fn emit(&mut self, at: Timestamp, event: GateEvent) -> &AuditRecord {
        let record = AuditRecord {
            id: uuid::Uuid::new_v4(),
            sequence: self.records.len() as u64 + 1,
            at,
            event,
        };

        // No subscribers is fine; the log itself is the source of truth.
        let delivered = self.sender.send(record.clone()).unwrap_or(0);
        debug!(
            sequence = record.sequence,
            event = record.event.name(),
            subscribers = delivered,
            "Audit record emitted"
        );

        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditRecord> {
        self.sender.subscribe()
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Records with `sequence > after`.
    pub fn records_since(&self, after: u64) -> &[AuditRecord] {
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(self.records.len());
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&AuditRecord> {
        self.records.last()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
