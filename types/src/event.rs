//! Historical staking events.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Address, Amount, Timestamp, TxHash};

/// Maximum number of events a transaction history retains.
pub const HISTORY_LIMIT: usize = 100;

/// The four event streams the staking contract emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Staked,
    Withdrawn,
    EmergencyWithdrawn,
    RewardsClaimed,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Staked,
        EventKind::Withdrawn,
        EventKind::EmergencyWithdrawn,
        EventKind::RewardsClaimed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staked => "Staked",
            Self::Withdrawn => "Withdrawn",
            Self::EmergencyWithdrawn => "EmergencyWithdrawn",
            Self::RewardsClaimed => "RewardsClaimed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific event fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    Staked {
        amount: Amount,
        new_total_staked: Amount,
        current_reward_rate: u128,
    },
    Withdrawn {
        amount: Amount,
        new_total_staked: Amount,
        current_reward_rate: u128,
        rewards_accrued: Amount,
    },
    EmergencyWithdrawn {
        amount: Amount,
        penalty: Amount,
        new_total_staked: Amount,
    },
    RewardsClaimed {
        amount: Amount,
        new_pending_rewards: Amount,
        total_staked: Amount,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Staked { .. } => EventKind::Staked,
            Self::Withdrawn { .. } => EventKind::Withdrawn,
            Self::EmergencyWithdrawn { .. } => EventKind::EmergencyWithdrawn,
            Self::RewardsClaimed { .. } => EventKind::RewardsClaimed,
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            Self::Staked { amount, .. }
            | Self::Withdrawn { amount, .. }
            | Self::EmergencyWithdrawn { amount, .. }
            | Self::RewardsClaimed { amount, .. } => *amount,
        }
    }

    /// Contract-wide total staked right after the event.
    pub fn total_staked_after(&self) -> Amount {
        match self {
            Self::Staked { new_total_staked, .. }
            | Self::Withdrawn { new_total_staked, .. }
            | Self::EmergencyWithdrawn { new_total_staked, .. } => *new_total_staked,
            Self::RewardsClaimed { total_staked, .. } => *total_staked,
        }
    }
}

/// One on-chain staking action, decoded from a log entry. Immutable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub tx_hash: TxHash,
    pub user: Address,
    pub timestamp: Timestamp,
    pub block_number: u64,
    pub log_index: u64,
    pub payload: EventPayload,
}

impl TransactionEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
