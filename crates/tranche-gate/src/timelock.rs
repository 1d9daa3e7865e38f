//! Governance Timelock FSM.
//!
//! ```text
//!            request_disable            finalize_disable
//!  Enabled ──────────────────▶ DisableRequested ──────────────▶ Disabled
//!     ▲                          │  ▲ (re-request restarts wait)    │
//!     │                          └──┘                               │ request_enable
//!     │        finalize_enable                                      ▼
//!     └────────────────────────────────────────────────── EnableRequested
//! ```
//!
//! A request stamps `now`; finalizing requires `now >= requested_at + delay`.
//! Re-requesting overwrites the pending request, so an old elapsed request
//! can never be held back for a later surprise finalize. There is at most
//! one outstanding request; no queue.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tranche_types::Timestamp;

use crate::error::GateError;

/// What a governance request asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceAction {
    Disable,
    Enable,
}

impl fmt::Display for GovernanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GovernanceAction::Disable => f.write_str("disable"),
            GovernanceAction::Enable => f.write_str("enable"),
        }
    }
}

/// Observable FSM state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceState {
    Enabled,
    DisableRequested,
    Disabled,
    EnableRequested,
}

impl fmt::Display for GovernanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GovernanceState::Enabled => "enabled",
            GovernanceState::DisableRequested => "disable-requested",
            GovernanceState::Disabled => "disabled",
            GovernanceState::EnableRequested => "enable-requested",
        };
        f.write_str(s)
    }
}

/// The single outstanding request, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub action: GovernanceAction,
    pub requested_at: Timestamp,
    pub ready_at: Timestamp,
}

/// Suspension flag plus its request/finalize protocol.
#[derive(Debug, Clone)]
pub struct GovernanceTimelock {
    disabled: bool,
    pending: Option<PendingRequest>,
    delay: Duration,
}

impl GovernanceTimelock {
    /// Starts `Enabled` with nothing pending.
    pub fn new(delay: Duration) -> Self {
        Self {
            disabled: false,
            pending: None,
            delay,
        }
    }

    pub fn state(&self) -> GovernanceState {
        match (self.disabled, self.pending.map(|p| p.action)) {
            (false, Some(GovernanceAction::Disable)) => GovernanceState::DisableRequested,
            (true, Some(GovernanceAction::Enable)) => GovernanceState::EnableRequested,
            (false, _) => GovernanceState::Enabled,
            (true, _) => GovernanceState::Disabled,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn pending(&self) -> Option<PendingRequest> {
        self.pending
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Open (or restart) a request. Disable is valid only while enabled,
    /// enable only while disabled.
    pub fn request(
        &mut self,
        action: GovernanceAction,
        now: Timestamp,
    ) -> Result<PendingRequest, GateError> {
        let valid = match action {
            GovernanceAction::Disable => !self.disabled,
            GovernanceAction::Enable => self.disabled,
        };
        if !valid {
            return Err(GateError::InvalidGovernanceState {
                state: self.state(),
                action,
            });
        }

        let request = PendingRequest {
            action,
            requested_at: now,
            ready_at: now.saturating_add(self.delay),
        };
        self.pending = Some(request);
        Ok(request)
    }

    /// Complete the outstanding request of kind `action` if its wait has elapsed.
    pub fn finalize(&mut self, action: GovernanceAction, now: Timestamp) -> Result<(), GateError> {
        let request = match self.pending {
            Some(p) if p.action == action => p,
            _ => return Err(GateError::NoPendingRequest(action)),
        };

        if now < request.ready_at {
            return Err(GateError::TimelockNotElapsed {
                ready_at: request.ready_at,
                now,
            });
        }

        self.disabled = action == GovernanceAction::Disable;
        self.pending = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: u64 = 259_200;

    fn fsm() -> GovernanceTimelock {
        GovernanceTimelock::new(Duration::from_secs(DELAY))
    }

    #[test]
    fn initial_state_enabled() {
        let t = fsm();
        assert_eq!(t.state(), GovernanceState::Enabled);
        assert!(!t.is_disabled());
        assert!(t.pending().is_none());
    }

    #[test]
    fn disable_boundary() {
        let mut t = fsm();
        t.request(GovernanceAction::Disable, Timestamp(0)).unwrap();
        assert_eq!(t.state(), GovernanceState::DisableRequested);

        let err = t
            .finalize(GovernanceAction::Disable, Timestamp(DELAY - 1))
            .unwrap_err();
        assert_eq!(
            err,
            GateError::TimelockNotElapsed {
                ready_at: Timestamp(DELAY),
                now: Timestamp(DELAY - 1)
            }
        );
        assert!(!t.is_disabled());

        t.finalize(GovernanceAction::Disable, Timestamp(DELAY)).unwrap();
        assert_eq!(t.state(), GovernanceState::Disabled);
        assert!(t.pending().is_none());
    }

    #[test]
    fn re_request_restarts_wait() {
        let mut t = fsm();
        t.request(GovernanceAction::Disable, Timestamp(0)).unwrap();
        t.request(GovernanceAction::Disable, Timestamp(1_000)).unwrap();

        // Would have been ready against the first request.
        assert!(t.finalize(GovernanceAction::Disable, Timestamp(DELAY)).is_err());
        assert!(t
            .finalize(GovernanceAction::Disable, Timestamp(DELAY + 1_000))
            .is_ok());
    }

    #[test]
    fn finalize_without_request() {
        let mut t = fsm();
        assert_eq!(
            t.finalize(GovernanceAction::Disable, Timestamp(10)),
            Err(GateError::NoPendingRequest(GovernanceAction::Disable))
        );
        assert_eq!(
            t.finalize(GovernanceAction::Enable, Timestamp(10)),
            Err(GateError::NoPendingRequest(GovernanceAction::Enable))
        );
    }

    #[test]
    fn finalize_wrong_kind_is_no_pending() {
        let mut t = fsm();
        t.request(GovernanceAction::Disable, Timestamp(0)).unwrap();
        assert_eq!(
            t.finalize(GovernanceAction::Enable, Timestamp(DELAY)),
            Err(GateError::NoPendingRequest(GovernanceAction::Enable))
        );
        assert_eq!(t.state(), GovernanceState::DisableRequested);
    }

    #[test]
    fn request_in_wrong_state_rejected() {
        let mut t = fsm();
        assert_eq!(
            t.request(GovernanceAction::Enable, Timestamp(0)),
            Err(GateError::InvalidGovernanceState {
                state: GovernanceState::Enabled,
                action: GovernanceAction::Enable
            })
        );

        t.request(GovernanceAction::Disable, Timestamp(0)).unwrap();
        t.finalize(GovernanceAction::Disable, Timestamp(DELAY)).unwrap();
        assert!(matches!(
            t.request(GovernanceAction::Disable, Timestamp(DELAY)),
            Err(GateError::InvalidGovernanceState { .. })
        ));
    }

    #[test]
    fn full_cycle() {
        let mut t = fsm();
        t.request(GovernanceAction::Disable, Timestamp(0)).unwrap();
        t.finalize(GovernanceAction::Disable, Timestamp(DELAY)).unwrap();

        let req = t.request(GovernanceAction::Enable, Timestamp(DELAY + 5)).unwrap();
        assert_eq!(req.ready_at, Timestamp(2 * DELAY + 5));
        assert_eq!(t.state(), GovernanceState::EnableRequested);
        assert!(t.is_disabled());

        assert!(t
            .finalize(GovernanceAction::Enable, Timestamp(2 * DELAY + 4))
            .is_err());
        t.finalize(GovernanceAction::Enable, Timestamp(2 * DELAY + 5))
            .unwrap();
        assert_eq!(t.state(), GovernanceState::Enabled);
    }
}
