//! Lock-period display helpers.

use stakeview_types::Timestamp;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Remaining lock time as `"{d}d {h}h"`, `"{h}h {m}m"` or `"{m}m"`;
/// `"Unlocked"` once `end` is reached.
pub fn format_time_remaining(end: Timestamp, now: Timestamp) -> String {
    let remaining = end.as_secs().saturating_sub(now.as_secs());
    if remaining == 0 {
        return "Unlocked".to_string();
    }

    let days = remaining / DAY;
    let hours = (remaining % DAY) / HOUR;
    let minutes = (remaining % HOUR) / MINUTE;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Percentage of the lock period elapsed at `now`, rounded to the nearest
/// integer and clamped to `0..=100`. A zero-length period counts as complete.
pub fn lock_progress(start: Timestamp, end: Timestamp, now: Timestamp) -> u8 {
    if now >= end {
        return 100;
    }
    if now <= start {
        return 0;
    }
    let total = u128::from(start.elapsed_since(end));
    let elapsed = u128::from(start.elapsed_since(now));
    ((elapsed * 100 + total / 2) / total).min(100) as u8
}
