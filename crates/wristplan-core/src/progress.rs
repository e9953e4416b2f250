//! Midnight-aware duration and progress arithmetic over time-of-day values.
//!
//! All spans are measured forward from the first argument to the second. When
//! the second time-of-day is numerically before the first, the span wraps
//! through midnight.

use chrono::{Duration, NaiveTime, Timelike};

pub const SECONDS_PER_DAY: i64 = 86_400;

fn secs_of_day(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight())
}

/// Forward distance in seconds from `from` to `to`, wrapping through midnight.
///
/// Equal times yield zero.
pub fn span_secs(from: NaiveTime, to: NaiveTime) -> i64 {
    let (from, to) = (secs_of_day(from), secs_of_day(to));
    if to >= from {
        to - from
    } else {
        (SECONDS_PER_DAY - from) + to
    }
}

/// Length of the interval `start..end`. Zero for a degenerate interval.
pub fn total(start: NaiveTime, end: NaiveTime) -> Duration {
    Duration::seconds(span_secs(start, end))
}

/// Time since `start`, measured forward to `now`.
pub fn elapsed(start: NaiveTime, now: NaiveTime) -> Duration {
    Duration::seconds(span_secs(start, now))
}

/// Time from `now` forward to `end`.
pub fn remaining(now: NaiveTime, end: NaiveTime) -> Duration {
    Duration::seconds(span_secs(now, end))
}

/// Fraction of `start..end` elapsed at `now`, clamped to `[0, 1]`.
///
/// Returns 0 for a zero-length interval.
pub fn progress(start: NaiveTime, end: NaiveTime, now: NaiveTime) -> f64 {
    let total_secs = span_secs(start, end);
    if total_secs == 0 {
        return 0.0;
    }
    let elapsed_secs = span_secs(start, now);
    (elapsed_secs as f64 / total_secs as f64).clamp(0.0, 1.0)
}

/// Render a duration as `{h}h {m}m`, `{m}m`, `{h}h` or `{s}s`, in that order
/// of precedence.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0);
    let hours = secs / 3600;
    let minutes = (secs / 60) % 60;

    if hours != 0 && minutes != 0 {
        format!("{hours}h {minutes}m")
    } else if hours == 0 && minutes != 0 {
        format!("{minutes}m")
    } else if hours != 0 {
        format!("{hours}h")
    } else {
        format!("{secs}s")
    }
}

/// Number of quarter-hour tick marks drawn along the progress arc.
pub fn quarter_hour_marks(start: NaiveTime, end: NaiveTime) -> u32 {
    let minutes = span_secs(start, end) / 60;
    u32::try_from(minutes / 15 + 1).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn same_day_interval() {
        assert_eq!(total(t(9, 0), t(10, 0)), Duration::hours(1));
        assert_eq!(elapsed(t(9, 0), t(9, 30)), Duration::minutes(30));
        assert_eq!(remaining(t(9, 30), t(10, 0)), Duration::minutes(30));
        assert!((progress(t(9, 0), t(10, 0), t(9, 30)) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn midnight_spanning_interval() {
        assert_eq!(total(t(23, 0), t(1, 0)), Duration::hours(2));
        assert_eq!(elapsed(t(23, 0), t(0, 30)), Duration::minutes(90));
        assert_eq!(remaining(t(0, 30), t(1, 0)), Duration::minutes(30));
        assert!((progress(t(23, 0), t(1, 0), t(0, 30)) - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn degenerate_interval_has_zero_progress() {
        assert_eq!(total(t(8, 0), t(8, 0)), Duration::zero());
        assert_eq!(progress(t(8, 0), t(8, 0), t(8, 0)), 0.0);
        assert_eq!(progress(t(8, 0), t(8, 0), t(12, 0)), 0.0);
    }

    #[test]
    fn progress_at_start_is_zero() {
        assert_eq!(progress(t(9, 0), t(10, 0), t(9, 0)), 0.0);
        assert_eq!(progress(t(22, 0), t(2, 0), t(22, 0)), 0.0);
    }

    #[test]
    fn duration_format_precedence() {
        assert_eq!(format_duration(Duration::minutes(90)), "1h 30m");
        assert_eq!(format_duration(Duration::minutes(30)), "30m");
        assert_eq!(format_duration(Duration::hours(2)), "2h");
        assert_eq!(format_duration(Duration::seconds(3630)), "1h");
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
        assert_eq!(format_duration(Duration::zero()), "0s");
    }

    #[test]
    fn quarter_marks_include_both_ends() {
        assert_eq!(quarter_hour_marks(t(9, 0), t(10, 0)), 5);
        assert_eq!(quarter_hour_marks(t(9, 0), t(9, 10)), 1);
        assert_eq!(quarter_hour_marks(t(23, 0), t(1, 0)), 9);
    }
}
