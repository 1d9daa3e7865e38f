use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use tranche_types::Identity;

use crate::error::GateError;
use crate::traits::AttestorRegistry;

/// Identity & Role Guard.
///
/// Holds the guardian identity, the operator allowlist and the attestor
/// registry reference. Answers role questions; the only mutations are the
/// guardian-driven allowlist overwrite and guardian rotation, which the
/// gate invokes after its own guard clauses.
pub struct RoleGuard {
    guardian: Identity,
    operators: HashMap<Identity, bool>,
    registry: Arc<dyn AttestorRegistry>,
}

impl RoleGuard {
    pub fn new(guardian: Identity, registry: Arc<dyn AttestorRegistry>) -> Result<Self, GateError> {
        if guardian.is_null() {
            return Err(GateError::InvalidIdentity);
        }
        Ok(Self {
            guardian,
            operators: HashMap::new(),
            registry,
        })
    }

    pub fn guardian(&self) -> Identity {
        self.guardian
    }

    pub fn is_guardian(&self, caller: &Identity) -> bool {
        !caller.is_null() && *caller == self.guardian
    }

    pub fn is_allowed_attestor(&self, caller: &Identity) -> bool {
        let allowed = !caller.is_null() && self.registry.is_attestor(caller);
        debug!(caller = %caller, allowed, "Attestor check");
        allowed
    }

    pub fn is_allowed_operator(&self, identity: &Identity) -> bool {
        self.operators.get(identity).copied().unwrap_or(false)
    }

    /// Guard clause: fail unless `caller` is the guardian.
    pub fn require_guardian(&self, caller: &Identity) -> Result<(), GateError> {
        if self.is_guardian(caller) {
            Ok(())
        } else {
            Err(GateError::NotGuardian(*caller))
        }
    }

    /// Guard clause: fail unless `caller` is a registered attestor.
    pub fn require_attestor(&self, caller: &Identity) -> Result<(), GateError> {
        if self.is_allowed_attestor(caller) {
            Ok(())
        } else {
            Err(GateError::NotAttestor(*caller))
        }
    }

    /// Overwrite the allowlist entry. No history is kept.
    pub fn set_operator(&mut self, operator: Identity, allowed: bool) -> Result<(), GateError> {
        if operator.is_null() {
            return Err(GateError::InvalidIdentity);
        }
        self.operators.insert(operator, allowed);
        Ok(())
    }

    /// Replace the guardian, returning the previous one. Takes effect immediately.
    pub fn rotate_guardian(&mut self, new_guardian: Identity) -> Result<Identity, GateError> {
        if new_guardian.is_null() {
            return Err(GateError::InvalidIdentity);
        }
        Ok(std::mem::replace(&mut self.guardian, new_guardian))
    }

    /// Currently allowlisted operators.
    pub fn allowed_operators(&self) -> Vec<Identity> {
        let mut ops: Vec<Identity> = self
            .operators
            .iter()
            .filter(|(_, allowed)| **allowed)
            .map(|(id, _)| *id)
            .collect();
        ops.sort();
        ops
    }

    pub fn registry(&self) -> &Arc<dyn AttestorRegistry> {
        &self.registry
    }
}
