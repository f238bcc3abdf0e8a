//! # Step Scheduler
//!
//! Computes when the next step of an enrollment becomes due. The rules, in
//! order:
//!
//! 1. Add the step's delay (days then hours) to the base time.
//! 2. Clamp the hour into the sequence's sending window `[start, end)`:
//!    earlier than `start` moves to `start:00` the same day, `end` or later
//!    moves to `start:00` the next day. Clamping zeroes minutes and seconds;
//!    a time already inside the window keeps them.
//! 3. If weekend sending is off, shift Saturday two days and Sunday one day
//!    forward to land on Monday. The shifted time is NOT re-clamped: a
//!    Friday-evening send that clamps onto Saturday morning lands on Monday
//!    at window start, and an in-window Saturday time keeps its minutes on
//!    Monday. Hosts rely on this exact sequence of shifts.
//!
//! All arithmetic is UTC. Host applications own any timezone presentation.

use crate::models::SendingPolicy;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};

/// Stateless scheduling rules. See the module docs for the algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepScheduler;

impl StepScheduler {
    /// Next due time for a step with the given delay, starting from `base`.
    ///
    /// Negative delays are treated as zero.
    pub fn next_time(
        policy: &SendingPolicy,
        delay_days: i32,
        delay_hours: i32,
        base: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let mut at = base
            + Duration::days(i64::from(delay_days.max(0)))
            + Duration::hours(i64::from(delay_hours.max(0)));

        at = clamp_to_window(at, policy.start_hour, policy.end_hour);

        if !policy.send_on_weekends {
            at = match at.weekday() {
                Weekday::Sat => at + Duration::days(2),
                Weekday::Sun => at + Duration::days(1),
                _ => at,
            };
        }

        at
    }
}

fn clamp_to_window(at: DateTime<Utc>, start_hour: u32, end_hour: u32) -> DateTime<Utc> {
    let hour = at.hour();
    if hour < start_hour {
        window_open(at, start_hour)
    } else if hour >= end_hour {
        window_open(at + Duration::days(1), start_hour)
    } else {
        at
    }
}

/// The given day at `hour:00:00`. Hours come from a sanitized policy, so the
/// construction cannot fail; the identity fallback keeps the signature total.
fn window_open(at: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_opt(hour, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SendingPolicy {
        SendingPolicy {
            start_hour: 9,
            end_hour: 17,
            send_on_weekends: false,
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    // 2026-03-02 is a Monday, 2026-03-06 a Friday.

    #[test]
    fn test_in_window_weekday_is_untouched() {
        let base = utc(2026, 3, 2, 10, 17);
        let at = StepScheduler::next_time(&policy(), 0, 0, base);
        assert_eq!(at, base, "minutes must be preserved inside the window");
    }

    #[test]
    fn test_delays_are_added_before_clamping() {
        let base = utc(2026, 3, 2, 10, 0);
        assert_eq!(
            StepScheduler::next_time(&policy(), 1, 0, base),
            utc(2026, 3, 3, 10, 0)
        );
        assert_eq!(
            StepScheduler::next_time(&policy(), 0, 3, base),
            utc(2026, 3, 2, 13, 0)
        );
    }

    #[test]
    fn test_negative_delays_treated_as_zero() {
        let base = utc(2026, 3, 2, 10, 0);
        assert_eq!(StepScheduler::next_time(&policy(), -3, -8, base), base);
    }

    #[test]
    fn test_before_window_clamps_to_same_day_start() {
        let base = utc(2026, 3, 2, 7, 45);
        assert_eq!(
            StepScheduler::next_time(&policy(), 0, 0, base),
            utc(2026, 3, 2, 9, 0),
            "clamping must zero the minutes"
        );
    }

    #[test]
    fn test_at_window_end_moves_to_next_day_start() {
        let base = utc(2026, 3, 2, 17, 0);
        assert_eq!(
            StepScheduler::next_time(&policy(), 0, 0, base),
            utc(2026, 3, 3, 9, 0)
        );
    }

    #[test]
    fn test_last_window_hour_is_still_inside() {
        let base = utc(2026, 3, 2, 16, 59);
        assert_eq!(StepScheduler::next_time(&policy(), 0, 0, base), base);
    }

    #[test]
    fn test_delay_hours_can_push_past_window_end() {
        let base = utc(2026, 3, 2, 15, 0);
        assert_eq!(
            StepScheduler::next_time(&policy(), 0, 3, base),
            utc(2026, 3, 3, 9, 0)
        );
    }

    #[test]
    fn test_friday_plus_two_days_lands_monday_same_time() {
        // Friday 14:00 + 2 days is Sunday 14:00, inside the window, so the
        // weekend shift alone moves it. Monday 14:00, minutes intact.
        let base = utc(2026, 3, 6, 14, 0);
        assert_eq!(
            StepScheduler::next_time(&policy(), 2, 0, base),
            utc(2026, 3, 9, 14, 0)
        );
    }

    #[test]
    fn test_saturday_shifts_two_days_without_reclamp() {
        // Friday 16:30 + 1 day is Saturday 16:30: in-window, shifted to
        // Monday 16:30 with minutes preserved because no re-clamp runs.
        let base = utc(2026, 3, 6, 16, 30);
        assert_eq!(
            StepScheduler::next_time(&policy(), 1, 0, base),
            utc(2026, 3, 9, 16, 30)
        );
    }

    #[test]
    fn test_clamp_onto_saturday_then_shift_to_monday() {
        // Friday 20:00 clamps to Saturday 09:00, then shifts to Monday 09:00.
        let base = utc(2026, 3, 6, 20, 0);
        assert_eq!(
            StepScheduler::next_time(&policy(), 0, 0, base),
            utc(2026, 3, 9, 9, 0)
        );
    }

    #[test]
    fn test_sunday_shifts_one_day() {
        let base = utc(2026, 3, 8, 11, 15);
        assert_eq!(
            StepScheduler::next_time(&policy(), 0, 0, base),
            utc(2026, 3, 9, 11, 15)
        );
    }

    #[test]
    fn test_weekends_allowed_skips_the_shift() {
        let weekend_policy = SendingPolicy {
            send_on_weekends: true,
            ..policy()
        };
        let base = utc(2026, 3, 7, 10, 0);
        assert_eq!(
            StepScheduler::next_time(&weekend_policy, 0, 0, base),
            base
        );
    }

    #[test]
    fn test_custom_window_hours() {
        let night_policy = SendingPolicy {
            start_hour: 6,
            end_hour: 12,
            send_on_weekends: true,
        };
        let base = utc(2026, 3, 2, 13, 0);
        assert_eq!(
            StepScheduler::next_time(&night_policy, 0, 0, base),
            utc(2026, 3, 3, 6, 0)
        );
    }
}
