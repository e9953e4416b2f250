//! Weekly schedule model and document loader.
//!
//! A schedule document is a list of day groups. Each group names the weekdays
//! it applies to and carries an ordered list of entries:
//!
//! ```json
//! { "mainSchedule": [
//!     { "days": ["Mon", "Tue"],
//!       "schedule": [
//!         { "name": "Deep work", "startTime": "09:00", "endTime": "10:00",
//!           "habits": ["Water"], "vibrateOnStart": [0, 300],
//!           "vibrateBeforeEnd": [0, 200, 100, 200], "vibrateBeforeEndSecs": 60 } ] } ] }
//! ```
//!
//! Entries are immutable once loaded. An entry whose end is earlier than its
//! start spans midnight.

mod time;

use std::path::Path;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

pub use time::{format_hhmm, hhmm, parse_hhmm};

const BUNDLED_SCHEDULE: &str = include_str!("../../assets/schedule.json");

/// A named time-of-day interval with habits and vibration patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub name: String,
    #[serde(rename = "startTime", with = "hhmm")]
    pub start: NaiveTime,
    #[serde(rename = "endTime", with = "hhmm")]
    pub end: NaiveTime,
    #[serde(default)]
    pub habits: Vec<String>,
    /// On/off durations in milliseconds played when the entry starts.
    #[serde(default)]
    pub vibrate_on_start: Vec<u64>,
    /// On/off durations in milliseconds played ahead of the entry's end.
    #[serde(default)]
    pub vibrate_before_end: Vec<u64>,
    #[serde(rename = "vibrateBeforeEndSecs", default)]
    pub vibrate_before_end_lead_secs: u32,
}

impl ScheduleEntry {
    /// Stable identity used in ledger keys: `name@HH:mm`.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, format_hhmm(self.start))
    }

    pub fn spans_midnight(&self) -> bool {
        self.end < self.start
    }

    /// `HH:mm - HH:mm`
    pub fn window_label(&self) -> String {
        format!("{} - {}", format_hhmm(self.start), format_hhmm(self.end))
    }
}

/// Which time-of-day orders entries inside a day group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Start,
    End,
}

/// Entries shared by one or more weekdays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub days: Vec<Weekday>,
    #[serde(rename = "schedule")]
    pub entries: Vec<ScheduleEntry>,
}

impl DaySchedule {
    pub fn applies_to(&self, day: Weekday) -> bool {
        self.days.contains(&day)
    }
}

/// Top-level schedule document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSchedule {
    #[serde(rename = "mainSchedule")]
    pub groups: Vec<DaySchedule>,
}

impl WeekSchedule {
    /// Parse a schedule document and order each group by `sort_by`.
    ///
    /// # Errors
    /// Returns an error on malformed JSON, non-`HH:mm` times or unnamed entries.
    pub fn from_json(json: &str, sort_by: SortKey) -> Result<Self, ScheduleError> {
        let mut schedule: WeekSchedule = serde_json::from_str(json)?;
        schedule.validate()?;
        schedule.sort(sort_by);
        Ok(schedule)
    }

    /// Read and parse a schedule document from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or fails to parse.
    pub fn load(path: &Path, sort_by: SortKey) -> Result<Self, ScheduleError> {
        let json = std::fs::read_to_string(path).map_err(|source| ScheduleError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let schedule = Self::from_json(&json, sort_by)?;
        tracing::debug!(path = %path.display(), groups = schedule.groups.len(), "schedule loaded");
        Ok(schedule)
    }

    /// The schedule shipped with the crate.
    ///
    /// # Errors
    /// Only fails if the bundled asset itself is broken.
    pub fn bundled(sort_by: SortKey) -> Result<Self, ScheduleError> {
        Self::from_json(BUNDLED_SCHEDULE, sort_by)
    }

    fn validate(&self) -> Result<(), ScheduleError> {
        for (group_idx, group) in self.groups.iter().enumerate() {
            if group.days.is_empty() {
                tracing::warn!(group = group_idx, "day group lists no weekdays and will never apply");
            }
            for (index, entry) in group.entries.iter().enumerate() {
                if entry.name.trim().is_empty() {
                    return Err(ScheduleError::EmptyName {
                        group: group_idx,
                        index,
                    });
                }
            }
        }
        Ok(())
    }

    fn sort(&mut self, sort_by: SortKey) {
        for group in &mut self.groups {
            match sort_by {
                SortKey::Start => group.entries.sort_by_key(|e| e.start),
                SortKey::End => group.entries.sort_by_key(|e| e.end),
            }
        }
    }

    /// All entries for `day`, in store order.
    ///
    /// A weekday listed by several groups gets the union of their entries.
    /// A weekday listed by none has no entries.
    pub fn entries_for(&self, day: Weekday) -> Vec<&ScheduleEntry> {
        self.groups
            .iter()
            .filter(|g| g.applies_to(day))
            .flat_map(|g| g.entries.iter())
            .collect()
    }

    /// Entries for `day` ordered by start time, ties kept in store order.
    pub fn timeline(&self, day: Weekday) -> Vec<&ScheduleEntry> {
        let mut entries = self.entries_for(day);
        entries.sort_by_key(|e| e.start);
        entries
    }

    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }
}
