//! Property-based tests for quiet hours

use chrono::NaiveTime;
use lusotown_engine::engine::notifications::{is_quiet_time, QuietHours};
use proptest::prelude::*;

fn time_strategy() -> impl Strategy<Value = NaiveTime> {
    (0u32..24, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

proptest! {
    #[test]
    fn test_window_and_its_complement_partition_the_day(
        start in time_strategy(),
        end in time_strategy(),
        now in time_strategy(),
    ) {
        prop_assume!(start != end);
        let window = QuietHours { enabled: true, start, end };
        let complement = QuietHours { enabled: true, start: end, end: start };

        prop_assert_ne!(is_quiet_time(now, &window), is_quiet_time(now, &complement));
    }

    #[test]
    fn test_disabled_window_is_never_quiet(
        start in time_strategy(),
        end in time_strategy(),
        now in time_strategy(),
    ) {
        let window = QuietHours { enabled: false, start, end };
        prop_assert!(!is_quiet_time(now, &window));
    }
}
