//! Tranche Gate: evidence-gated, single-payout disbursement with timelocked
//! governance.
//!
//! Attestors submit delivery evidence per period (corridor hours and
//! kilograms delivered). Once both accumulators reach their targets, the
//! fixed tranche for that period can be paid to an allowlisted operator,
//! exactly once. A guardian can suspend and resume the system, but only
//! through a request, a fixed wait, then a finalize.
//!
//! ## Invariants
//!
//! - **Single payout**: a period's `paid` flag goes false → true at most once
//!   and never returns to false after a successful transfer.
//! - **Evidence before value**: disbursement requires both targets met.
//! - **Monotone accumulators**: attestations only ever add, never wrap.
//! - **Suspension**: while disabled, no attestation and no disbursement
//!   succeeds; deposits and governance still do.
//! - **Timelock**: disable/enable only take effect after `timelock_secs`.
//! - **Audit**: every successful mutation appends exactly one record;
//!   rejections append nothing.
//!
//! ## Components
//!
//! 1. **Identity & Role Guard** ([`guard`]): guardian, operator allowlist,
//!    attestor registry.
//! 2. **Period Ledger** ([`period`]): per-period accumulators and paid flag.
//! 3. **Disbursement Gate** ([`disbursement`]): authorize, commit, transfer.
//! 4. **Governance Timelock** ([`timelock`]): request/finalize state machine.
//! 5. **Integrity Anchor** ([`anchor`]): current source hash.
//!
//! [`TrancheGate`] composes them behind one writer lock.

pub mod anchor;
pub mod audit;
pub mod clock;
pub mod config;
pub mod disbursement;
pub mod error;
pub mod gate;
pub mod guard;
pub mod mocks;
pub mod period;
pub mod state;
pub mod timelock;
pub mod traits;

pub use anchor::IntegrityAnchor;
pub use audit::{AuditLog, AuditRecord, GateEvent};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GateConfig;
pub use disbursement::{Disbursement, DisbursementGate, DisbursementTicket};
pub use error::{ErrorClass, GateError};
pub use gate::{GateSnapshot, TrancheGate};
pub use guard::RoleGuard;
pub use mocks::{InMemoryValueLedger, StaticAttestorRegistry};
pub use period::{Period, PeriodLedger, Thresholds};
pub use state::GateState;
pub use timelock::{GovernanceAction, GovernanceState, GovernanceTimelock, PendingRequest};
pub use traits::{AttestorRegistry, TransferError, ValueLedger};

pub use tranche_types::{Amount, AttestationKind, Identity, PeriodKey, SourceHash, Timestamp};
