//! Per-action state machine.
//!
//! Each action kind has one slot. A slot moves
//! `Idle -> Submitting -> Confirming -> Succeeded`, or to `Failed` from any
//! non-idle phase, and returns to `Idle` when the action finishes. Starting
//! an action whose slot is not idle is refused.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::CoordinatorError;
use crate::listener::{ListenerRegistry, StakingEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ActionKind {
    Approve,
    Stake,
    Withdraw,
    EmergencyWithdraw,
    ClaimRewards,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Approve,
        ActionKind::Stake,
        ActionKind::Withdraw,
        ActionKind::EmergencyWithdraw,
        ActionKind::ClaimRewards,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Approve => "approve",
            ActionKind::Stake => "stake",
            ActionKind::Withdraw => "withdraw",
            ActionKind::EmergencyWithdraw => "emergency withdraw",
            ActionKind::ClaimRewards => "claim rewards",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ActionPhase {
    #[default]
    Idle,
    /// Waiting for the signer to sign and broadcast.
    Submitting,
    /// Broadcast; waiting for block inclusion.
    Confirming,
    Succeeded,
    Failed,
}

impl ActionPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, ActionPhase::Idle)
    }
}

/// Current phase per action kind.
#[derive(Debug, Default)]
pub struct ActionSlots {
    phases: Mutex<[ActionPhase; ActionKind::ALL.len()]>,
}

impl ActionSlots {
    fn phases(&self) -> MutexGuard<'_, [ActionPhase; ActionKind::ALL.len()]> {
        self.phases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self, kind: ActionKind) -> ActionPhase {
        self.phases()[kind.index()]
    }

    /// Claim the slot for `kind`, moving it to `Submitting`.
    pub fn begin<'a>(
        &'a self,
        kind: ActionKind,
        listeners: &'a ListenerRegistry,
    ) -> Result<ActionGuard<'a>, CoordinatorError> {
        {
            let mut phases = self.phases();
            let slot = &mut phases[kind.index()];
            if !slot.is_idle() {
                return Err(CoordinatorError::ActionInProgress(kind));
            }
            *slot = ActionPhase::Submitting;
        }
        listeners.emit(&StakingEvent::PhaseChanged {
            action: kind,
            phase: ActionPhase::Submitting,
        });
        Ok(ActionGuard {
            slots: self,
            listeners,
            kind,
        })
    }

    fn set(&self, kind: ActionKind, phase: ActionPhase) {
        self.phases()[kind.index()] = phase;
    }
}

/// Exclusive hold on one action slot. Dropping it returns the slot to `Idle`.
pub struct ActionGuard<'a> {
    slots: &'a ActionSlots,
    listeners: &'a ListenerRegistry,
    kind: ActionKind,
}

impl ActionGuard<'_> {
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn advance(&mut self, phase: ActionPhase) {
        self.slots.set(self.kind, phase);
        self.listeners.emit(&StakingEvent::PhaseChanged {
            action: self.kind,
            phase,
        });
    }

    /// Mark the action failed and report `err` to listeners.
    pub fn fail(&mut self, err: impl Into<CoordinatorError>) -> CoordinatorError {
        let err = err.into();
        tracing::warn!(action = %self.kind, error = %err, "action failed");
        self.advance(ActionPhase::Failed);
        self.listeners.emit(&StakingEvent::Error {
            action: self.kind,
            error: err.clone(),
        });
        err
    }
}

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        self.advance(ActionPhase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn busy_slot_is_refused_until_guard_drops() {
        let slots = ActionSlots::default();
        let listeners = ListenerRegistry::default();

        let guard = slots.begin(ActionKind::Stake, &listeners).unwrap();
        assert_eq!(slots.phase(ActionKind::Stake), ActionPhase::Submitting);
        assert_eq!(
            slots.begin(ActionKind::Stake, &listeners).err(),
            Some(CoordinatorError::ActionInProgress(ActionKind::Stake))
        );
        // Other kinds are independent.
        assert!(slots.begin(ActionKind::ClaimRewards, &listeners).is_ok());

        drop(guard);
        assert_eq!(slots.phase(ActionKind::Stake), ActionPhase::Idle);
        assert!(slots.begin(ActionKind::Stake, &listeners).is_ok());
    }

    #[test]
    fn phases_are_reported_in_order() {
        let slots = ActionSlots::default();
        let listeners = ListenerRegistry::default();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        listeners.subscribe(move |event| {
            if let StakingEvent::PhaseChanged { phase, .. } = event {
                sink.lock().unwrap().push(*phase);
            }
        });

        {
            let mut guard = slots.begin(ActionKind::Withdraw, &listeners).unwrap();
            guard.advance(ActionPhase::Confirming);
            guard.fail(CoordinatorError::Validation("boom".into()));
        }

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ActionPhase::Submitting,
                ActionPhase::Confirming,
                ActionPhase::Failed,
                ActionPhase::Idle
            ]
        );
    }
}
