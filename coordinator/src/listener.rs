//! Coordinator events and their subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stakeview_chain::ChainError;
use stakeview_types::{Amount, TxHash};

use crate::action::{ActionKind, ActionPhase};
use crate::error::CoordinatorError;

/// Events observers can subscribe to on the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StakingEvent {
    PhaseChanged {
        action: ActionKind,
        phase: ActionPhase,
    },
    Approved {
        tx_hash: TxHash,
        amount: Amount,
    },
    Staked {
        tx_hash: TxHash,
        amount: Amount,
    },
    /// `amount` is `None` for a full withdrawal.
    Withdrawn {
        tx_hash: TxHash,
        amount: Option<Amount>,
    },
    EmergencyWithdrawn {
        tx_hash: TxHash,
    },
    RewardsClaimed {
        tx_hash: TxHash,
        amount: Amount,
    },
    /// A view still failed after the last retry.
    RefreshFailed {
        view: &'static str,
        error: ChainError,
    },
    Error {
        action: ActionKind,
        error: CoordinatorError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&StakingEvent) + Send + Sync>;

/// Synchronous fan-out of [`StakingEvent`]s.
///
/// Listeners run inline on the emitting task. Each event goes to the
/// listeners registered at the moment it is emitted, once each; a listener
/// may subscribe or unsubscribe from inside its callback.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl ListenerRegistry {
    fn listeners(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&StakingEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((id, Arc::new(listener)));
        id
    }

    /// Returns whether `id` was subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn emit(&self, event: &StakingEvent) {
        let snapshot: Vec<Listener> = self
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn claimed() -> StakingEvent {
        StakingEvent::RewardsClaimed {
            tx_hash: TxHash::ZERO,
            amount: Amount::from_tokens(1),
        }
    }

    #[test]
    fn emit_calls_all_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ListenerRegistry::default();

        let c1 = Arc::clone(&counter);
        registry.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&counter);
        registry.subscribe(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        registry.emit(&claimed());
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ListenerRegistry::default();
        let c = Arc::clone(&counter);
        let id = registry.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.emit(&claimed());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn listener_added_during_emit_misses_that_event() {
        let registry = Arc::new(ListenerRegistry::default());
        let late_calls = Arc::new(AtomicUsize::new(0));

        let reg = Arc::clone(&registry);
        let late = Arc::clone(&late_calls);
        registry.subscribe(move |_| {
            let late = Arc::clone(&late);
            reg.subscribe(move |_| {
                late.fetch_add(1, Ordering::SeqCst);
            });
        });

        registry.emit(&claimed());
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 2);

        registry.emit(&claimed());
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }
}
