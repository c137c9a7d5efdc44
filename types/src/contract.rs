//! Records read from the staking and token contracts.

use serde::{Deserialize, Serialize};

use crate::{Amount, Timestamp};

/// Global staking-contract parameters. Observed only, never written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    /// Tokens staked across all users.
    pub total_staked: Amount,
    /// Current reward rate as reported by the contract (raw units).
    pub current_reward_rate: u128,
    /// Minimum lock duration in seconds.
    pub min_lock_duration: u64,
    /// Emergency-withdraw penalty as a whole percentage.
    pub emergency_withdraw_penalty: u64,
    /// APR before any volume decay (18-decimal percentage).
    pub initial_apr: Amount,
    /// APR decrease per thousand tokens staked (18-decimal percentage).
    pub apr_reduction_per_thousand: Amount,
    pub paused: bool,
}

/// A user's token balance and allowance toward the staking contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub balance: Amount,
    pub allowance: Amount,
}

impl TokenInfo {
    /// Whether staking `amount` requires a prior approval.
    pub fn needs_approval(&self, amount: Amount) -> bool {
        amount > self.allowance
    }
}

/// The raw `getUserDetails(address)` record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub staked_amount: Amount,
    pub last_stake_timestamp: Timestamp,
    pub pending_rewards: Amount,
    /// Seconds until the stake unlocks; zero once unlocked.
    pub time_until_unlock: u64,
    pub can_withdraw: bool,
}
