//! Derived dashboard metrics. Pure functions of view values and the clock.

use std::fmt;

use serde::Serialize;
use stakeview_types::{Address, Amount, ContractInfo, Position, Timestamp, TokenInfo};

pub use stakeview_utils::lock_progress;

/// One token in raw units.
const UNIT: u128 = Amount::from_tokens(1).raw();

/// Raw units in 0.01.
const HUNDREDTH: u128 = UNIT / 100;

const SECS_PER_DAY: u64 = 86_400;

/// Current APR after volume decay:
/// `max(0, initial_apr - floor(total_staked / 1000) * reduction)`,
/// rounded half up to two decimals. All values are 18-decimal percentages.
pub fn current_apr(initial_apr: Amount, reduction_per_thousand: Amount, total_staked: Amount) -> Amount {
    let thousands = total_staked.raw() / (1_000 * UNIT);
    let reduction = Amount::from_raw(reduction_per_thousand.raw().saturating_mul(thousands));
    let apr = initial_apr.saturating_sub(reduction).raw();
    let rounded = apr.saturating_add(HUNDREDTH / 2) / HUNDREDTH * HUNDREDTH;
    Amount::from_raw(rounded)
}

/// Remaining lock time, e.g. `"3d 4h"`, or `"Unlocked"`.
pub fn time_remaining(end: Timestamp, now: Timestamp) -> String {
    stakeview_utils::format_time_remaining(end, now)
}

/// Everything the dashboard shows, computed from the current view values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub account: Option<Address>,
    pub balance: Amount,
    pub allowance: Amount,
    pub total_staked: Amount,
    pub current_apr: Amount,
    pub min_lock_duration: u64,
    pub emergency_withdraw_penalty: u64,
    pub paused: bool,
    pub position: Option<Position>,
    pub user_stake: Amount,
    pub pending_rewards: Amount,
    /// Percentage of the lock elapsed; `None` without a position.
    pub lock_progress: Option<u8>,
    pub time_remaining: Option<String>,
    pub lock_label: Option<&'static str>,
    /// When the position unlocks.
    pub maturity: Option<Timestamp>,
}

impl DashboardSummary {
    pub fn build(
        account: Option<Address>,
        token: &TokenInfo,
        info: &ContractInfo,
        position: Option<&Position>,
        now: Timestamp,
    ) -> Self {
        Self {
            account,
            balance: token.balance,
            allowance: token.allowance,
            total_staked: info.total_staked,
            current_apr: current_apr(
                info.initial_apr,
                info.apr_reduction_per_thousand,
                info.total_staked,
            ),
            min_lock_duration: info.min_lock_duration,
            emergency_withdraw_penalty: info.emergency_withdraw_penalty,
            paused: info.paused,
            position: position.cloned(),
            user_stake: position.map(|p| p.amount).unwrap_or_default(),
            pending_rewards: position.map(|p| p.reward).unwrap_or_default(),
            lock_progress: position.map(|p| lock_progress(p.start_time, p.end_time, now)),
            time_remaining: position.map(|p| time_remaining(p.end_time, now)),
            lock_label: position.map(|p| p.lock_label(now)),
            maturity: position.map(|p| p.end_time),
        }
    }

    /// Minimum lock in whole days, rounded up.
    pub fn lock_duration_days(&self) -> u64 {
        self.min_lock_duration.div_ceil(SECS_PER_DAY)
    }
}

impl fmt::Display for DashboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.account {
            Some(account) => writeln!(f, "Account:          {}", account.short())?,
            None => writeln!(f, "Account:          not connected")?,
        }
        writeln!(f, "Wallet balance:   {}", self.balance)?;
        writeln!(f, "Allowance:        {}", self.allowance)?;
        writeln!(f, "Total staked:     {}", self.total_staked.to_fixed(2))?;
        writeln!(f, "Current APR:      {}%", self.current_apr.to_fixed(2))?;
        writeln!(f, "Lock duration:    {} days", self.lock_duration_days())?;
        writeln!(f, "Emergency fee:    {}%", self.emergency_withdraw_penalty)?;
        if self.paused {
            writeln!(f, "Contract:         PAUSED")?;
        }
        writeln!(f, "Your stake:       {}", self.user_stake)?;
        write!(f, "Pending rewards:  {}", self.pending_rewards)?;
        if let (Some(progress), Some(remaining), Some(label)) =
            (self.lock_progress, &self.time_remaining, self.lock_label)
        {
            writeln!(f)?;
            write!(f, "Lock:             {label}, {progress}% elapsed, {remaining}")?;
        }
        Ok(())
    }
}
