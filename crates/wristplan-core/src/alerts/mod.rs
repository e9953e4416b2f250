//! Boundary alerts: at-most-once vibration at entry start and ahead of entry end.
//!
//! The platform side is reached through two seams:
//! - [`WakeTimer`]: one-shot, wake-capable timers that deliver an
//!   [`AlertPayload`] back to [`AlertScheduler::on_timer`]
//! - [`Vibrator`]: fire-and-forget vibration output

mod ledger;
mod scheduler;
mod tokio_timers;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::TimerError;

pub use ledger::{AlertLedger, ArmedTimer};
pub use scheduler::{AlertPhase, AlertScheduler, AlertSettings};
pub use tokio_timers::TokioTimers;

/// Which edge of an entry an alert belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    Start,
    End,
}

impl Boundary {
    pub const ALL: [Boundary; 2] = [Boundary::Start, Boundary::End];

    pub fn as_str(self) -> &'static str {
        match self {
            Boundary::Start => "start",
            Boundary::End => "end",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "start" => Some(Boundary::Start),
            "end" => Some(Boundary::End),
            _ => None,
        }
    }
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identity of one requested timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(pub i64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a delivered timer needs to fire its alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub timer_id: TimerId,
    pub entry_id: String,
    pub entry_name: String,
    pub boundary: Boundary,
    /// Absolute boundary instant: the occurrence's start or end.
    pub occurrence: NaiveDateTime,
    /// When the timer was asked to go off.
    pub wake_at: NaiveDateTime,
    pub pattern: Vec<u64>,
}

/// Platform alarm service.
pub trait WakeTimer: Send + Sync {
    /// Request a precise wake-capable one-shot timer.
    ///
    /// Returns [`TimerError::ExactDenied`] when precise scheduling is not
    /// permitted; the caller then falls back to [`WakeTimer::schedule_inexact`].
    fn schedule_exact(&self, payload: &AlertPayload) -> Result<(), TimerError>;

    /// Request a best-effort one-shot timer.
    fn schedule_inexact(&self, payload: &AlertPayload) -> Result<(), TimerError>;

    /// Cancel a previously requested timer. Unknown ids are ignored.
    fn cancel(&self, id: TimerId);

    /// Whether the backend still holds `id` and has not delivered it yet.
    ///
    /// A process-local backend loses its timers when the process dies, so an
    /// armed record left over from a previous run reports `false` here.
    fn is_pending(&self, id: TimerId) -> bool;
}

/// Vibration output: alternating off/on durations in milliseconds.
pub trait Vibrator: Send + Sync {
    fn vibrate(&self, pattern: &[u64]);
}

/// Timer backend for hosts that only poll on render ticks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTimers;

impl WakeTimer for NoTimers {
    fn schedule_exact(&self, _payload: &AlertPayload) -> Result<(), TimerError> {
        Err(TimerError::Unavailable("polling host".into()))
    }

    fn schedule_inexact(&self, _payload: &AlertPayload) -> Result<(), TimerError> {
        Err(TimerError::Unavailable("polling host".into()))
    }

    fn cancel(&self, _id: TimerId) {}

    fn is_pending(&self, _id: TimerId) -> bool {
        false
    }
}
