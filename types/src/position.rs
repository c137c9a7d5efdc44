//! A user's staking position as presented to the front-end.

use serde::{Deserialize, Serialize};

use crate::{Address, Amount, Timestamp, UserDetails};

/// Lifecycle status of a [`Position`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionStatus {
    /// Staked and past the lock period.
    Active,
    /// Not produced by contract reads: a zero stake yields no position.
    Inactive,
    /// Staked but still locked. Also the status of the optimistic
    /// placeholder installed right after a stake.
    Pending,
}

/// A user's single stake.
///
/// `can_withdraw` and `time_until_unlock` are derived from `end_time` at the
/// moment the position was built; use the `*_at` methods to re-derive them
/// for a later instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub owner: Address,
    pub status: PositionStatus,
    pub amount: Amount,
    pub reward: Amount,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub can_withdraw: bool,
    pub time_until_unlock: u64,
}

impl Position {
    /// Build a position from the contract's user record.
    ///
    /// Returns `None` when nothing is staked, whatever the pending reward.
    /// While the contract reports a remaining lock, the end time is `now` plus
    /// that remainder; once unlocked it is the nominal `start + min_lock`,
    /// capped at `now` so the position reads as withdrawable.
    pub fn from_details(
        owner: Address,
        details: &UserDetails,
        min_lock_duration: u64,
        now: Timestamp,
    ) -> Option<Self> {
        if details.staked_amount.is_zero() {
            return None;
        }

        let start_time = details.last_stake_timestamp;
        let end_time = if details.time_until_unlock > 0 {
            now.plus_secs(details.time_until_unlock)
        } else {
            start_time.plus_secs(min_lock_duration).min(now)
        }
        .max(start_time);

        let status = if now >= end_time {
            PositionStatus::Active
        } else {
            PositionStatus::Pending
        };
        Some(Self::with_times(
            owner,
            status,
            details.staked_amount,
            details.pending_rewards,
            start_time,
            end_time,
            now,
        ))
    }

    /// Placeholder shown immediately after a confirmed stake, before the
    /// contract is re-read. The end time is an approximation.
    pub fn optimistic(
        owner: Address,
        amount: Amount,
        min_lock_duration: u64,
        now: Timestamp,
    ) -> Self {
        Self::with_times(
            owner,
            PositionStatus::Pending,
            amount,
            Amount::ZERO,
            now,
            now.plus_secs(min_lock_duration),
            now,
        )
    }

    fn with_times(
        owner: Address,
        status: PositionStatus,
        amount: Amount,
        reward: Amount,
        start_time: Timestamp,
        end_time: Timestamp,
        now: Timestamp,
    ) -> Self {
        Self {
            owner,
            status,
            amount,
            reward,
            start_time,
            end_time,
            can_withdraw: now >= end_time,
            time_until_unlock: end_time.as_secs().saturating_sub(now.as_secs()),
        }
    }

    pub fn can_withdraw_at(&self, now: Timestamp) -> bool {
        now >= self.end_time
    }

    pub fn time_until_unlock_at(&self, now: Timestamp) -> u64 {
        self.end_time.as_secs().saturating_sub(now.as_secs())
    }

    /// `"Unlocked"` or `"Locked"`.
    pub fn lock_label(&self, now: Timestamp) -> &'static str {
        if self.can_withdraw_at(now) {
            "Unlocked"
        } else {
            "Locked"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::new([0x11; 20])
    }

    fn details(staked: u128, rewards: u128, start: u64, remaining: u64) -> UserDetails {
        UserDetails {
            staked_amount: Amount::from_tokens(staked),
            last_stake_timestamp: Timestamp::new(start),
            pending_rewards: Amount::from_tokens(rewards),
            time_until_unlock: remaining,
            can_withdraw: remaining == 0,
        }
    }

    #[test]
    fn empty_details_produce_no_position() {
        assert!(Position::from_details(owner(), &details(0, 0, 0, 0), 100, Timestamp::new(50)).is_none());
    }

    #[test]
    fn locked_position_ends_after_remaining_lock() {
        let now = Timestamp::new(1_500);
        let pos = Position::from_details(owner(), &details(10, 1, 1_000, 500), 1_000, now).unwrap();
        assert_eq!(pos.status, PositionStatus::Pending);
        assert_eq!(pos.start_time, Timestamp::new(1_000));
        assert_eq!(pos.end_time, Timestamp::new(2_000));
        assert!(!pos.can_withdraw);
        assert_eq!(pos.time_until_unlock, 500);
        assert_eq!(pos.lock_label(now), "Locked");
    }

    #[test]
    fn unlocked_position_is_withdrawable() {
        let now = Timestamp::new(5_000);
        let pos = Position::from_details(owner(), &details(10, 1, 1_000, 0), 1_000, now).unwrap();
        assert_eq!(pos.end_time, Timestamp::new(2_000));
        assert_eq!(pos.status, PositionStatus::Active);
        assert!(pos.can_withdraw);
        assert_eq!(pos.time_until_unlock, 0);
        assert_eq!(pos.lock_label(now), "Unlocked");
    }

    #[test]
    fn rewards_without_stake_produce_no_position() {
        let pos = Position::from_details(owner(), &details(0, 5, 1_000, 0), 100, Timestamp::new(4_000));
        assert!(pos.is_none());
    }

    #[test]
    fn end_never_precedes_start() {
        // Local clock behind the chain: start is in the "future".
        let pos = Position::from_details(owner(), &details(1, 0, 9_000, 0), 100, Timestamp::new(8_000)).unwrap();
        assert!(pos.end_time >= pos.start_time);
    }

    #[test]
    fn optimistic_position_is_pending() {
        let now = Timestamp::new(100);
        let pos = Position::optimistic(owner(), Amount::from_tokens(5), 60, now);
        assert_eq!(pos.status, PositionStatus::Pending);
        assert_eq!(pos.end_time, Timestamp::new(160));
        assert_eq!(pos.time_until_unlock, 60);
        assert!(!pos.can_withdraw);
        assert!(pos.can_withdraw_at(Timestamp::new(160)));
        assert_eq!(pos.time_until_unlock_at(Timestamp::new(130)), 30);
    }
}
