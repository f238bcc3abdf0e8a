//! Property-based tests for the step scheduler. The unit tests pin the
//! documented examples; these pin the invariants across the whole input
//! space: delays, window clamping, and weekend shifts.

mod common;

use cadence_core::engine::StepScheduler;
use chrono::{Datelike, Duration, Timelike, Weekday};
use common::strategies::*;
use proptest::prelude::*;

proptest! {
    /// Property: Scheduling never lands before the delayed instant
    #[test]
    fn scheduled_time_is_never_early(
        base in base_time_strategy(),
        policy in sending_policy_strategy(),
        (delay_days, delay_hours) in delay_strategy(),
    ) {
        let result = StepScheduler::next_time(&policy, delay_days, delay_hours, base);
        let delayed = base + Duration::days(delay_days as i64) + Duration::hours(delay_hours as i64);
        prop_assert!(
            result >= delayed,
            "scheduled {} before delayed {}",
            result,
            delayed
        );
    }

    /// Property: The scheduled hour always falls inside the sending window;
    /// weekend shifts move whole days and cannot break this
    #[test]
    fn scheduled_hour_is_inside_the_window(
        base in base_time_strategy(),
        policy in sending_policy_strategy(),
        (delay_days, delay_hours) in delay_strategy(),
    ) {
        let result = StepScheduler::next_time(&policy, delay_days, delay_hours, base);
        prop_assert!(
            policy.contains_hour(result.hour()),
            "hour {} outside [{}, {})",
            result.hour(),
            policy.start_hour,
            policy.end_hour
        );
    }

    /// Property: With weekend sending disabled the result is never Saturday
    /// or Sunday
    #[test]
    fn weekends_are_skipped_when_disabled(
        base in base_time_strategy(),
        policy in sending_policy_strategy(),
        (delay_days, delay_hours) in delay_strategy(),
    ) {
        prop_assume!(!policy.send_on_weekends);
        let result = StepScheduler::next_time(&policy, delay_days, delay_hours, base);
        prop_assert!(
            !matches!(result.weekday(), Weekday::Sat | Weekday::Sun),
            "landed on {}",
            result.weekday()
        );
    }

    /// Property: Minutes and seconds survive when the delayed instant is
    /// already inside the window, and are zeroed when the clamp moved it
    #[test]
    fn clamping_is_the_only_thing_that_touches_minutes(
        base in base_time_strategy(),
        policy in sending_policy_strategy(),
        (delay_days, delay_hours) in delay_strategy(),
    ) {
        let result = StepScheduler::next_time(&policy, delay_days, delay_hours, base);
        let delayed = base + Duration::days(delay_days as i64) + Duration::hours(delay_hours as i64);

        if policy.contains_hour(delayed.hour()) {
            prop_assert_eq!(result.minute(), delayed.minute());
            prop_assert_eq!(result.second(), delayed.second());
            prop_assert_eq!(result.hour(), delayed.hour());
        } else {
            prop_assert_eq!(result.minute(), 0);
            prop_assert_eq!(result.second(), 0);
            prop_assert_eq!(result.hour(), policy.start_hour);
        }
    }

    /// Property: The scheduler adds at most the clamp (under a day) plus the
    /// weekend shift (two days)
    #[test]
    fn scheduling_overhead_is_bounded(
        base in base_time_strategy(),
        policy in sending_policy_strategy(),
        (delay_days, delay_hours) in delay_strategy(),
    ) {
        let result = StepScheduler::next_time(&policy, delay_days, delay_hours, base);
        let delayed = base + Duration::days(delay_days as i64) + Duration::hours(delay_hours as i64);

        let bound = if policy.send_on_weekends {
            Duration::days(2)
        } else {
            Duration::days(4)
        };
        prop_assert!(
            result - delayed <= bound,
            "scheduler pushed {} past the delayed instant",
            result - delayed
        );
    }

    /// Property: Negative delays schedule exactly like zero delays
    #[test]
    fn negative_delays_are_treated_as_zero(
        base in base_time_strategy(),
        policy in sending_policy_strategy(),
        delay_days in -10i32..0,
        delay_hours in -10i32..0,
    ) {
        prop_assert_eq!(
            StepScheduler::next_time(&policy, delay_days, delay_hours, base),
            StepScheduler::next_time(&policy, 0, 0, base)
        );
    }
}
