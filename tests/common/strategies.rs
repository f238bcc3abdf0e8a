//! Proptest strategies for scheduler inputs.

use cadence_core::models::SendingPolicy;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

/// Strategy for generating valid sending windows (start < end, both 0-23)
pub fn sending_policy_strategy() -> impl Strategy<Value = SendingPolicy> {
    (0u32..22, any::<bool>()).prop_flat_map(|(start_hour, send_on_weekends)| {
        ((start_hour + 1)..=23u32).prop_map(move |end_hour| SendingPolicy {
            start_hour,
            end_hour,
            send_on_weekends,
        })
    })
}

/// Strategy for generating step delays within configured bounds
pub fn delay_strategy() -> impl Strategy<Value = (i32, i32)> {
    (0i32..30, 0i32..48)
}

/// Strategy for generating base times spread over two years so every weekday,
/// hour, and minute combination appears
pub fn base_time_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (1_735_689_600i64..1_798_761_600i64).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0)
            .single()
            .expect("in-range timestamp")
    })
}
