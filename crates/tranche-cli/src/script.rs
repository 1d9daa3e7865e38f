//! Scripted replay against in-memory collaborators.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tranche_gate::{
    Clock, GateConfig, GateError, InMemoryValueLedger, ManualClock, StaticAttestorRegistry, TrancheGate,
    ValueLedger,
};
use tranche_types::{Amount, AttestationKind, Identity, PeriodKey, SourceHash, Timestamp};

/// One scripted operation. Identities accept `@label` or 64 hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Mint balance into an account (harness only)
    Fund { who: Identity, amount: u64 },
    /// Add an identity to the in-memory registry and announce it
    RegisterAttestor { caller: Identity, attestor: Identity },
    Deposit { from: Identity, amount: u64 },
    Attest {
        caller: Identity,
        period: PeriodKey,
        /// `corridor_hours`, `kg_delivered`, `hours`, `kg`, `0` or `1`
        kind: String,
        value: u64,
        /// Evidence artifact; its digest becomes the meta hash
        #[serde(default)]
        evidence: Option<String>,
    },
    SetOperator {
        caller: Identity,
        operator: Identity,
        allowed: bool,
    },
    Disburse { period: PeriodKey, operator: Identity },
    RequestDisable { caller: Identity },
    FinalizeDisable { caller: Identity },
    RequestEnable { caller: Identity },
    FinalizeEnable { caller: Identity },
    SetSourceHash { caller: Identity, hash: String },
    UpdateGuardian { caller: Identity, new_guardian: Identity },
    Advance { secs: u64 },
    Inspect {
        #[serde(default)]
        period: Option<PeriodKey>,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Fund { .. } => "fund",
            Step::RegisterAttestor { .. } => "register_attestor",
            Step::Deposit { .. } => "deposit",
            Step::Attest { .. } => "attest",
            Step::SetOperator { .. } => "set_operator",
            Step::Disburse { .. } => "disburse",
            Step::RequestDisable { .. } => "request_disable",
            Step::FinalizeDisable { .. } => "finalize_disable",
            Step::RequestEnable { .. } => "request_enable",
            Step::FinalizeEnable { .. } => "finalize_enable",
            Step::SetSourceHash { .. } => "set_source_hash",
            Step::UpdateGuardian { .. } => "update_guardian",
            Step::Advance { .. } => "advance",
            Step::Inspect { .. } => "inspect",
        }
    }
}

pub fn load_script(path: &Path) -> anyhow::Result<Vec<Step>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing script {}", path.display()))
}

/// Result of one replayed step, printed as a JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub step: usize,
    pub op: &'static str,
    pub at: Timestamp,
    #[serde(flatten)]
    pub status: Status,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Ok { result: Value },
    Rejected { error: String, class: String },
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, Status::Ok { .. })
    }
}

/// A gate wired to in-memory collaborators and a manual clock.
pub struct Harness {
    gate: TrancheGate,
    clock: Arc<ManualClock>,
    ledger: Arc<InMemoryValueLedger>,
    registry: Arc<StaticAttestorRegistry>,
}

impl Harness {
    pub fn new(config: GateConfig) -> Result<Self, GateError> {
        let clock = Arc::new(ManualClock::new(Timestamp::EPOCH));
        let ledger = Arc::new(InMemoryValueLedger::new(config.pool_account));
        let registry = Arc::new(StaticAttestorRegistry::new());
        let gate = TrancheGate::new(config, registry.clone(), ledger.clone(), clock.clone())?;
        Ok(Self {
            gate,
            clock,
            ledger,
            registry,
        })
    }

    pub fn gate(&self) -> &TrancheGate {
        &self.gate
    }

    pub fn run(&self, index: usize, step: &Step) -> Outcome {
        let at = self.clock.now();
        let status = match self.apply(step) {
            Ok(result) => Status::Ok { result },
            Err(err) => Status::Rejected {
                class: err.class().to_string(),
                error: err.to_string(),
            },
        };
        Outcome {
            step: index,
            op: step.name(),
            at,
            status,
        }
    }

    fn apply(&self, step: &Step) -> Result<Value, GateError> {
        let gate = &self.gate;
        let value = match step {
            Step::Fund { who, amount } => {
                self.ledger.fund(*who, Amount::from(*amount));
                json!({ "balance": self.ledger.balance_of(who).to_string() })
            }
            Step::RegisterAttestor { caller, attestor } => {
                self.registry.register(*attestor);
                json!({ "registered": gate.announce_attestor(*caller, *attestor)? })
            }
            Step::Deposit { from, amount } => {
                gate.deposit(*from, Amount::from(*amount))?;
                json!({ "pool_balance": gate.pool_balance().to_string() })
            }
            Step::Attest {
                caller,
                period,
                kind,
                value,
                evidence,
            } => {
                let kind = parse_kind(kind)?;
                let meta = evidence
                    .as_deref()
                    .map(|e| SourceHash::digest(e.as_bytes()))
                    .unwrap_or_default();
                let updated = gate.record_attestation(*caller, *period, kind, *value, meta)?;
                json!({ "period": updated, "payable": gate.is_payable(period) })
            }
            Step::SetOperator {
                caller,
                operator,
                allowed,
            } => {
                gate.set_operator(*caller, *operator, *allowed)?;
                Value::Null
            }
            Step::Disburse { period, operator } => {
                let paid = gate.disburse(*period, *operator)?;
                json!({
                    "period": paid.period,
                    "operator": paid.operator,
                    "amount": paid.amount.to_string(),
                })
            }
            Step::RequestDisable { caller } => json!(gate.request_disable(*caller)?),
            Step::FinalizeDisable { caller } => {
                gate.finalize_disable(*caller)?;
                json!({ "state": gate.governance_state() })
            }
            Step::RequestEnable { caller } => json!(gate.request_enable(*caller)?),
            Step::FinalizeEnable { caller } => {
                gate.finalize_enable(*caller)?;
                json!({ "state": gate.governance_state() })
            }
            Step::SetSourceHash { caller, hash } => {
                let hash: SourceHash = hash.parse()?;
                json!({ "previous": gate.set_source_hash(*caller, hash)? })
            }
            Step::UpdateGuardian {
                caller,
                new_guardian,
            } => json!({ "previous": gate.update_guardian(*caller, *new_guardian)? }),
            Step::Advance { secs } => {
                let now = self.clock.advance(Duration::from_secs(*secs));
                json!({ "now": now })
            }
            Step::Inspect { period } => {
                let mut view = json!({ "gate": gate.snapshot() });
                if let Some(key) = period {
                    view["period"] = json!(gate.get_period(key));
                    view["payable"] = json!(gate.is_payable(key));
                }
                view
            }
        };
        Ok(value)
    }
}

fn parse_kind(raw: &str) -> Result<AttestationKind, GateError> {
    match raw.parse::<u8>() {
        Ok(tag) => Ok(AttestationKind::from_tag(tag)?),
        Err(_) => Ok(raw.parse::<AttestationKind>()?),
    }
}
