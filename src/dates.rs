//! Rendering of Matrix millisecond timestamps.

use chrono::{DateTime, Local, Utc};

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// `2024-01-15 10:00:00` in local time, or `-` for unset timestamps.
pub fn format_timestamp(millis: i64) -> String {
    if millis <= 0 {
        return "-".to_string();
    }
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

const DAY: i64 = 86_400;

/// Upper bound in seconds (exclusive), unit length in seconds, suffix.
const RELATIVE_UNITS: [(i64, i64, &str); 6] = [
    (60, 1, "s"),
    (3_600, 60, "m"),
    (DAY, 3_600, "h"),
    (7 * DAY, DAY, "d"),
    (28 * DAY, 7 * DAY, "w"),
    (360 * DAY, 30 * DAY, "mo"),
];

/// Short relative age such as `5m ago`, both arguments in milliseconds.
pub fn format_relative_date(millis: i64, now_millis: i64) -> String {
    if now_millis <= 0 || millis <= 0 {
        return "-".to_string();
    }
    let delta = (millis / 1000 - now_millis / 1000).abs();
    if delta < 10 {
        return "now".to_string();
    }
    let (value, unit) = RELATIVE_UNITS
        .iter()
        .find(|(bound, _, _)| delta < *bound)
        .map(|(_, length, unit)| (delta / length, *unit))
        .unwrap_or((delta / (365 * DAY), "y"));
    if millis > now_millis {
        format!("in {value}{unit}")
    } else {
        format!("{value}{unit} ago")
    }
}
