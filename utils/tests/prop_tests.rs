use proptest::prelude::*;
use stakeview_types::Timestamp;
use stakeview_utils::{format_time_remaining, lock_progress};

proptest! {
    #[test]
    fn lock_progress_is_monotone_and_bounded(
        start in 0u64..1_000_000,
        len in 1u64..1_000_000,
        a in 0u64..3_000_000,
        b in 0u64..3_000_000,
    ) {
        let end = start + len;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let p_lo = lock_progress(Timestamp::new(start), Timestamp::new(end), Timestamp::new(lo));
        let p_hi = lock_progress(Timestamp::new(start), Timestamp::new(end), Timestamp::new(hi));
        prop_assert!(p_lo <= p_hi);
        prop_assert!(p_hi <= 100);
        prop_assert_eq!(lock_progress(Timestamp::new(start), Timestamp::new(end), Timestamp::new(start)), 0);
        prop_assert_eq!(lock_progress(Timestamp::new(start), Timestamp::new(end), Timestamp::new(end)), 100);
    }

    #[test]
    fn unlocked_iff_end_reached(end in 0u64..10_000_000, now in 0u64..10_000_000) {
        let label = format_time_remaining(Timestamp::new(end), Timestamp::new(now));
        prop_assert_eq!(label == "Unlocked", now >= end);
    }
}
