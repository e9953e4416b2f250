use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::alerts::{Boundary, TimerId};
use crate::face::FaceSnapshot;

/// Every observable change on the face produces an Event.
/// The CLI prints them as JSON lines; hosts may forward them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A boundary alert won its ledger claim and vibrated.
    AlertFired {
        entry_id: String,
        entry_name: String,
        boundary: Boundary,
        occurrence: NaiveDateTime,
        pattern: Vec<u64>,
        at: NaiveDateTime,
    },
    TimerArmed {
        timer_id: TimerId,
        entry_id: String,
        boundary: Boundary,
        occurrence: NaiveDateTime,
        wake_at: NaiveDateTime,
        exact: bool,
    },
    TimerCancelled {
        timer_id: TimerId,
        entry_id: String,
        boundary: Boundary,
    },
    /// A delivered timer arrived too late to be meaningful.
    TimerDiscarded {
        timer_id: TimerId,
        entry_id: String,
        boundary: Boundary,
        wake_at: NaiveDateTime,
        at: NaiveDateTime,
    },
    /// A timer was delivered while the vibration toggle was off.
    AlertsDisabled {
        timer_id: TimerId,
        at: NaiveDateTime,
    },
    StateSnapshot {
        snapshot: FaceSnapshot,
    },
}

impl Event {
    /// The `type` tag this event serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::AlertFired { .. } => "AlertFired",
            Event::TimerArmed { .. } => "TimerArmed",
            Event::TimerCancelled { .. } => "TimerCancelled",
            Event::TimerDiscarded { .. } => "TimerDiscarded",
            Event::AlertsDisabled { .. } => "AlertsDisabled",
            Event::StateSnapshot { .. } => "StateSnapshot",
        }
    }
}
