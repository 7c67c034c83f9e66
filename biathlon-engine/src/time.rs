//! Time codec
//!
//! Parses and formats event timestamps (`[HH:MM:SS.mmm]`) and durations
//! (`HH:MM:SS[.mmm]`), and derives speeds from a distance and a duration.

use crate::types::{Duration, RaceError, Result, Timestamp};
use chrono::NaiveTime;

/// Layout of a time of day inside the brackets
pub const TIME_LAYOUT: &str = "%H:%M:%S%.3f";

/// Parse a timestamp; surrounding brackets are optional
///
/// `"[09:05:59.867]"` and `"09:05:59.867"` are both accepted.
pub fn parse_timestamp(value: &str) -> Result<Timestamp> {
    let trimmed = value.trim_matches(|c| c == '[' || c == ']');
    NaiveTime::parse_from_str(trimmed, TIME_LAYOUT).map_err(|e| RaceError::InvalidTime {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Format a timestamp as `[HH:MM:SS.mmm]`
pub fn format_timestamp(timestamp: Timestamp) -> String {
    format!("[{}]", format_time_of_day(timestamp))
}

/// Format a timestamp as `HH:MM:SS.mmm` (no brackets)
pub fn format_time_of_day(timestamp: Timestamp) -> String {
    timestamp.format(TIME_LAYOUT).to_string()
}

/// Parse a duration of the form `HH:MM:SS` or `HH:MM:SS.fff`
///
/// Minutes and seconds are not limited to 59; the fraction may carry up to
/// nanosecond precision.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let invalid = |reason: &str| RaceError::InvalidDuration {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() != 3 {
        return Err(invalid("expected HH:MM:SS[.mmm]"));
    }

    let hours = parse_digits(parts[0]).ok_or_else(|| invalid("hours must be a number"))?;
    let minutes = parse_digits(parts[1]).ok_or_else(|| invalid("minutes must be a number"))?;

    let (whole, fraction) = match parts[2].split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (parts[2], None),
    };
    let seconds = parse_digits(whole).ok_or_else(|| invalid("seconds must be a number"))?;

    let nanos = match fraction {
        Some(digits) => {
            if digits.is_empty() || digits.len() > 9 {
                return Err(invalid("fraction must have 1 to 9 digits"));
            }
            let scaled = parse_digits(digits).ok_or_else(|| invalid("fraction must be a number"))?;
            scaled * 10i64.pow(9 - digits.len() as u32)
        }
        None => 0,
    };

    let total_seconds = hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds))
        .ok_or_else(|| invalid("value too large"))?;

    Duration::try_seconds(total_seconds)
        .map(|d| d + Duration::nanoseconds(nanos))
        .ok_or_else(|| invalid("value too large"))
}

/// Unsigned decimal number (no sign, no whitespace)
fn parse_digits(text: &str) -> Option<i64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Format a duration as `HH:MM:SS.mmm`, rounded to the nearest millisecond
///
/// Hours are not wrapped at 24. Negative spans get a leading `-`.
pub fn format_duration(duration: Duration) -> String {
    let millis = rounded_millis(duration);
    let sign = if millis < 0 { "-" } else { "" };
    let millis = millis.unsigned_abs();

    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1000) % 60;
    let ms = millis % 1000;

    format!("{}{:02}:{:02}:{:02}.{:03}", sign, hours, minutes, seconds, ms)
}

/// Milliseconds, half away from zero
fn rounded_millis(duration: Duration) -> i64 {
    match duration.num_nanoseconds() {
        Some(nanos) => {
            let ms = nanos / 1_000_000;
            let rest = nanos % 1_000_000;
            if rest >= 500_000 {
                ms + 1
            } else if rest <= -500_000 {
                ms - 1
            } else {
                ms
            }
        }
        // Out of nanosecond range: millisecond precision is all that's left
        None => duration.num_milliseconds(),
    }
}

/// Duration in fractional seconds
pub fn duration_seconds(duration: Duration) -> f64 {
    match duration.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => duration.num_milliseconds() as f64 / 1e3,
    }
}

/// Speed in m/s; zero for non-positive durations
pub fn calculate_speed(distance: f64, duration: Duration) -> f64 {
    if duration <= Duration::zero() {
        return 0.0;
    }
    distance / duration_seconds(duration)
}

/// Add a duration to a time of day without wrapping around midnight
///
/// Results past the end of the day clamp to `23:59:59.999`, results before
/// the start clamp to `00:00:00.000`.
pub fn add_duration(timestamp: Timestamp, duration: Duration) -> Timestamp {
    let (result, overflow) = timestamp.overflowing_add_signed(duration);
    if overflow > 0 {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(result)
    } else if overflow < 0 {
        NaiveTime::MIN
    } else {
        result
    }
}
