//! Staking coordinator.
//!
//! [`StakingCoordinator`] composes the Token, Contract, Position and History
//! views with a [`ChainWriter`](stakeview_chain::ChainWriter). It validates
//! action preconditions, runs each write through a per-action state machine,
//! refreshes dependent views once a receipt is observed, and derives the
//! dashboard metrics on demand.

pub mod action;
pub mod coordinator;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod retry;

pub use action::{ActionKind, ActionPhase};
pub use coordinator::{RefreshReport, StakingCoordinator};
pub use error::CoordinatorError;
pub use listener::{ListenerRegistry, StakingEvent, SubscriptionId};
pub use metrics::{current_apr, lock_progress, time_remaining, DashboardSummary};
pub use retry::RefreshPolicy;
