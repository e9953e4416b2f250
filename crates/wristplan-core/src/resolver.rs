//! Interval resolver.
//!
//! Maps (weekday, time-of-day, schedule) to the active entry and the next
//! upcoming entry. Pure and allocation-light, so it is safe to call on every
//! render tick.
//!
//! ## Activity
//!
//! ```text
//! end >= start :  start < now < end
//! end <  start :  now > start || now < end     (spans midnight)
//! ```
//!
//! Boundary instants belong to neither side. A zero-length entry is never
//! active.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::Serialize;

use crate::progress;
use crate::schedule::{ScheduleEntry, WeekSchedule};

/// Days searched ahead for a next entry. Day 7 is the same weekday next week.
pub const LOOKAHEAD_DAYS: u32 = 7;

/// Whether `entry` is active at `now` under wraparound semantics.
pub fn is_active(entry: &ScheduleEntry, now: NaiveTime) -> bool {
    let (start, end) = (entry.start, entry.end);
    if end >= start {
        start < now && now < end
    } else {
        now > start || now < end
    }
}

/// The entry active at `now` on `today`, first in store order.
pub fn resolve_active<'a>(
    now: NaiveTime,
    today: Weekday,
    schedule: &'a WeekSchedule,
) -> Option<&'a ScheduleEntry> {
    schedule
        .entries_for(today)
        .into_iter()
        .find(|entry| is_active(entry, now))
}

/// The next entry to start after `now`.
///
/// Today's entries starting strictly after `now` win; otherwise the earliest
/// entry of the following days, wrapping Sun -> Mon.
pub fn resolve_next<'a>(
    now: NaiveTime,
    today: Weekday,
    schedule: &'a WeekSchedule,
) -> Option<&'a ScheduleEntry> {
    resolve_next_with_offset(now, today, schedule).map(|(entry, _)| entry)
}

/// Like [`resolve_next`], also returning how many days ahead the entry starts.
pub fn resolve_next_with_offset<'a>(
    now: NaiveTime,
    today: Weekday,
    schedule: &'a WeekSchedule,
) -> Option<(&'a ScheduleEntry, u32)> {
    let later_today = earliest_by_start(
        schedule
            .entries_for(today)
            .into_iter()
            .filter(|entry| entry.start > now),
    );
    if let Some(entry) = later_today {
        return Some((entry, 0));
    }

    let mut day = today;
    for offset in 1..=LOOKAHEAD_DAYS {
        day = day.succ();
        if let Some(entry) = earliest_by_start(schedule.entries_for(day).into_iter()) {
            return Some((entry, offset));
        }
    }
    None
}

/// Earliest start; on ties the first encountered wins.
fn earliest_by_start<'a>(
    entries: impl Iterator<Item = &'a ScheduleEntry>,
) -> Option<&'a ScheduleEntry> {
    let mut best: Option<&'a ScheduleEntry> = None;
    for entry in entries {
        if best.map_or(true, |current| entry.start < current.start) {
            best = Some(entry);
        }
    }
    best
}

/// One calendar instantiation of a recurring entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub entry: ScheduleEntry,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
}

impl Occurrence {
    fn from_start(entry: &ScheduleEntry, start_at: NaiveDateTime) -> Self {
        let end_at = start_at + progress::total(entry.start, entry.end);
        Self {
            entry: entry.clone(),
            start_at,
            end_at,
        }
    }

    /// The occurrence of an entry active at `now`.
    ///
    /// Anchored on the end boundary still ahead of `now`, so a
    /// midnight-spanning entry observed after midnight started yesterday.
    pub fn active_at(entry: &ScheduleEntry, now: NaiveDateTime) -> Self {
        let end_at = wake_instant(now, entry.end);
        Self {
            entry: entry.clone(),
            start_at: end_at - progress::total(entry.start, entry.end),
            end_at,
        }
    }

    /// The occurrence of an entry starting `days_ahead` days after `today`.
    pub fn upcoming(entry: &ScheduleEntry, today: NaiveDate, days_ahead: u32) -> Self {
        let date = today + Duration::days(i64::from(days_ahead));
        Self::from_start(entry, date.and_time(entry.start))
    }

    pub fn id(&self) -> String {
        self.entry.id()
    }
}

/// The absolute instant `time` next occurs at or after `now`.
///
/// Combines `now`'s date with `time`; an instant already in the past rolls
/// forward one day.
pub fn wake_instant(now: NaiveDateTime, time: NaiveTime) -> NaiveDateTime {
    let candidate = now.date().and_time(time);
    if candidate < now {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}

/// Per-tick resolution. Recomputed every tick, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedState<'a> {
    pub active: Option<&'a ScheduleEntry>,
    pub next: Option<&'a ScheduleEntry>,
    /// Day offset of `next` relative to today.
    pub next_days_ahead: u32,
    pub elapsed_secs: i64,
    pub total_secs: i64,
}

impl<'a> ResolvedState<'a> {
    pub fn resolve(now: NaiveTime, today: Weekday, schedule: &'a WeekSchedule) -> Self {
        let active = resolve_active(now, today, schedule);
        let (next, next_days_ahead) = match resolve_next_with_offset(now, today, schedule) {
            Some((entry, offset)) => (Some(entry), offset),
            None => (None, 0),
        };
        let (elapsed_secs, total_secs) = active
            .map(|entry| {
                (
                    progress::span_secs(entry.start, now),
                    progress::span_secs(entry.start, entry.end),
                )
            })
            .unwrap_or((0, 0));
        Self {
            active,
            next,
            next_days_ahead,
            elapsed_secs,
            total_secs,
        }
    }

    pub fn progress(&self) -> f64 {
        if self.total_secs == 0 {
            return 0.0;
        }
        (self.elapsed_secs as f64 / self.total_secs as f64).clamp(0.0, 1.0)
    }
}
