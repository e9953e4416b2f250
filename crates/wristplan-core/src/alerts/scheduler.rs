//! Alert scheduler.
//!
//! Each entry occurrence walks through:
//!
//! ```text
//! Idle -> StartArmed -> StartFired -> EndArmed -> EndFired
//!   ^                                               |
//!   +------------- next occurrence -----------------+
//! ```
//!
//! The phase is not stored as an enum. It is derived from the ledger: a fired
//! marker keyed by the occurrence's absolute boundary instant, and the armed
//! record for each boundary kind. A new occurrence has a new instant, which is
//! what resets it to `Idle`.
//!
//! Two inputs drive it:
//! - [`AlertScheduler::on_tick`] from the render loop: polls the active entry
//!   and (in timer mode) keeps one wake timer armed per boundary kind
//! - [`AlertScheduler::on_timer`] from a delivered wake timer
//!
//! Both take the same lock, and every firing goes through the ledger's atomic
//! claim, so a tick and a timer racing on one boundary vibrate once.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{AlertLedger, AlertPayload, ArmedTimer, Boundary, Vibrator, WakeTimer};
use crate::error::TimerError;
use crate::events::Event;
use crate::resolver::{self, Occurrence};
use crate::schedule::{ScheduleEntry, WeekSchedule};
use crate::storage::{AlertMode, AlertsConfig, KeyValueStore, VIBRATION_FLAG};

/// Where one occurrence stands in the alert state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPhase {
    Idle,
    StartArmed,
    StartFired,
    EndArmed,
    EndFired,
}

#[derive(Debug, Clone, Copy)]
pub struct AlertSettings {
    pub mode: AlertMode,
    /// A tick may fire a start alert this long after the entry began.
    pub start_grace: Duration,
    /// Timer deliveries later than this past their wake instant are dropped.
    pub stale_after: Duration,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self::from(&AlertsConfig::default())
    }
}

impl From<&AlertsConfig> for AlertSettings {
    fn from(config: &AlertsConfig) -> Self {
        Self {
            mode: config.mode,
            start_grace: Duration::seconds(i64::from(config.start_grace_secs)),
            stale_after: Duration::seconds(i64::from(config.stale_after_secs)),
        }
    }
}

/// A boundary worth a timer: not yet fired, wake instant not yet passed.
struct Target<'a> {
    entry: &'a ScheduleEntry,
    boundary: Boundary,
    occurrence: NaiveDateTime,
    wake_at: NaiveDateTime,
}

pub struct AlertScheduler {
    ledger: AlertLedger,
    timers: Arc<dyn WakeTimer>,
    vibrator: Arc<dyn Vibrator>,
    settings: AlertSettings,
    guard: Mutex<()>,
}

impl AlertScheduler {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        timers: Arc<dyn WakeTimer>,
        vibrator: Arc<dyn Vibrator>,
        settings: AlertSettings,
    ) -> Self {
        Self {
            ledger: AlertLedger::new(store),
            timers,
            vibrator,
            settings,
            guard: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &AlertLedger {
        &self.ledger
    }

    pub fn settings(&self) -> AlertSettings {
        self.settings
    }

    pub fn alerts_enabled(&self) -> bool {
        self.ledger.store().flag(VIBRATION_FLAG, true)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded state lives in the store, so a poisoned guard is still usable.
        self.guard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Render-tick entry point.
    pub fn on_tick(&self, now: NaiveDateTime, schedule: &WeekSchedule) -> Vec<Event> {
        let _guard = self.lock();
        let mut events = Vec::new();

        if !self.alerts_enabled() {
            self.cancel_all_locked(&mut events);
            return events;
        }

        let (today, time) = (now.weekday(), now.time());
        let active = resolver::resolve_active(time, today, schedule)
            .map(|entry| Occurrence::active_at(entry, now));
        let next = resolver::resolve_next_with_offset(time, today, schedule)
            .map(|(entry, days)| Occurrence::upcoming(entry, now.date(), days));

        if let Some(occ) = &active {
            self.poll_active(occ, now, &mut events);
        }

        if self.settings.mode == AlertMode::Timer {
            let start_target = next
                .iter()
                .find_map(|occ| self.target(occ, Boundary::Start, now));
            let end_target = active
                .iter()
                .chain(next.iter())
                .find_map(|occ| self.target(occ, Boundary::End, now));
            self.arm(Boundary::Start, start_target, now, &mut events);
            self.arm(Boundary::End, end_target, now, &mut events);
        }

        events
    }

    /// Delivered-timer entry point.
    pub fn on_timer(&self, payload: &AlertPayload, now: NaiveDateTime) -> Vec<Event> {
        let _guard = self.lock();
        let mut events = Vec::new();

        match self.ledger.armed(payload.boundary) {
            Ok(Some(armed)) if armed.timer_id == payload.timer_id => {
                if let Err(e) = self.ledger.clear_armed(payload.boundary) {
                    tracing::warn!(error = %e, "failed to clear delivered timer record");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read armed timer record"),
        }

        if !self.alerts_enabled() {
            tracing::debug!(timer_id = %payload.timer_id, "timer delivered while alerts are disabled");
            self.cancel_all_locked(&mut events);
            events.push(Event::AlertsDisabled {
                timer_id: payload.timer_id,
                at: now,
            });
            return events;
        }

        if now - payload.wake_at > self.settings.stale_after {
            tracing::warn!(
                timer_id = %payload.timer_id,
                entry = %payload.entry_id,
                wake_at = %payload.wake_at,
                "dropping stale timer delivery"
            );
            events.push(Event::TimerDiscarded {
                timer_id: payload.timer_id,
                entry_id: payload.entry_id.clone(),
                boundary: payload.boundary,
                wake_at: payload.wake_at,
                at: now,
            });
            return events;
        }

        events.extend(self.fire(
            &payload.entry_id,
            &payload.entry_name,
            payload.boundary,
            payload.occurrence,
            &payload.pattern,
            now,
        ));
        events
    }

    /// Cancel every outstanding timer, e.g. when the host shuts down or the
    /// schedule overlay is switched off.
    pub fn cancel_all(&self) -> Vec<Event> {
        let _guard = self.lock();
        let mut events = Vec::new();
        self.cancel_all_locked(&mut events);
        events
    }

    /// Phase of `occ` in the alert state machine.
    pub fn phase(&self, occ: &Occurrence) -> AlertPhase {
        let id = occ.id();
        let fired = |boundary, instant| {
            self.ledger
                .has_fired(&id, boundary, instant)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "ledger read failed");
                    false
                })
        };
        let armed = |boundary, instant| match self.ledger.armed(boundary) {
            Ok(Some(armed)) => armed.entry_id == id && armed.occurrence == instant,
            _ => false,
        };

        if fired(Boundary::End, occ.end_at) {
            AlertPhase::EndFired
        } else if fired(Boundary::Start, occ.start_at) {
            if armed(Boundary::End, occ.end_at) {
                AlertPhase::EndArmed
            } else {
                AlertPhase::StartFired
            }
        } else if armed(Boundary::Start, occ.start_at) {
            AlertPhase::StartArmed
        } else {
            AlertPhase::Idle
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn poll_active(&self, occ: &Occurrence, now: NaiveDateTime, events: &mut Vec<Event>) {
        let entry = &occ.entry;
        let id = entry.id();

        if now - occ.start_at <= self.settings.start_grace {
            events.extend(self.fire(
                &id,
                &entry.name,
                Boundary::Start,
                occ.start_at,
                &entry.vibrate_on_start,
                now,
            ));
        }

        let lead = Duration::seconds(i64::from(entry.vibrate_before_end_lead_secs));
        if occ.end_at - now <= lead {
            events.extend(self.fire(
                &id,
                &entry.name,
                Boundary::End,
                occ.end_at,
                &entry.vibrate_before_end,
                now,
            ));
        }
    }

    fn fire(
        &self,
        entry_id: &str,
        entry_name: &str,
        boundary: Boundary,
        occurrence: NaiveDateTime,
        pattern: &[u64],
        now: NaiveDateTime,
    ) -> Option<Event> {
        if pattern.is_empty() {
            return None;
        }
        match self.ledger.claim(entry_id, boundary, occurrence) {
            Ok(true) => {
                self.vibrator.vibrate(pattern);
                tracing::info!(entry = %entry_id, %boundary, %occurrence, "alert fired");
                Some(Event::AlertFired {
                    entry_id: entry_id.to_string(),
                    entry_name: entry_name.to_string(),
                    boundary,
                    occurrence,
                    pattern: pattern.to_vec(),
                    at: now,
                })
            }
            Ok(false) => {
                tracing::debug!(entry = %entry_id, %boundary, "alert already fired for this occurrence");
                None
            }
            Err(e) => {
                tracing::warn!(entry = %entry_id, %boundary, error = %e, "ledger claim failed, skipping alert");
                None
            }
        }
    }

    fn target<'a>(
        &self,
        occ: &'a Occurrence,
        boundary: Boundary,
        now: NaiveDateTime,
    ) -> Option<Target<'a>> {
        let entry = &occ.entry;
        let (occurrence, wake_at, pattern) = match boundary {
            Boundary::Start => (occ.start_at, occ.start_at, &entry.vibrate_on_start),
            Boundary::End => {
                let lead = Duration::seconds(i64::from(entry.vibrate_before_end_lead_secs));
                (occ.end_at, occ.end_at - lead, &entry.vibrate_before_end)
            }
        };
        if pattern.is_empty() || wake_at < now {
            return None;
        }
        match self.ledger.has_fired(&entry.id(), boundary, occurrence) {
            Ok(false) => Some(Target {
                entry,
                boundary,
                occurrence,
                wake_at,
            }),
            Ok(true) => None,
            Err(e) => {
                tracing::warn!(error = %e, "ledger read failed, not arming");
                None
            }
        }
    }

    /// Keep exactly one timer for `boundary`, pointing at `target`.
    fn arm(
        &self,
        boundary: Boundary,
        target: Option<Target<'_>>,
        now: NaiveDateTime,
        events: &mut Vec<Event>,
    ) {
        let current = match self.ledger.armed(boundary) {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(%boundary, error = %e, "failed to read armed timer record");
                return;
            }
        };

        if let Some(armed) = current {
            if self.timers.is_pending(armed.timer_id) {
                let unchanged = target.as_ref().is_some_and(|t| {
                    armed.entry_id == t.entry.id()
                        && armed.occurrence == t.occurrence
                        && armed.wake_at == t.wake_at
                });
                // Due but not yet delivered: the delivery decides, not the tick.
                let in_flight =
                    armed.wake_at <= now && now - armed.wake_at <= self.settings.stale_after;
                if unchanged || in_flight {
                    return;
                }
                self.cancel_armed(armed, events);
            } else {
                // Lost with a previous process, or already delivered.
                tracing::info!(
                    timer_id = %armed.timer_id,
                    entry = %armed.entry_id,
                    %boundary,
                    "armed timer no longer held by the backend, re-arming"
                );
                if let Err(e) = self.ledger.clear_armed(boundary) {
                    tracing::warn!(%boundary, error = %e, "failed to clear armed timer record");
                    return;
                }
            }
        }

        let Some(target) = target else {
            return;
        };
        debug_assert!(target.wake_at >= now);

        let timer_id = match self.ledger.next_request_id() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(%boundary, error = %e, "could not allocate timer id");
                return;
            }
        };
        let entry = target.entry;
        let payload = AlertPayload {
            timer_id,
            entry_id: entry.id(),
            entry_name: entry.name.clone(),
            boundary,
            occurrence: target.occurrence,
            wake_at: target.wake_at,
            pattern: match boundary {
                Boundary::Start => entry.vibrate_on_start.clone(),
                Boundary::End => entry.vibrate_before_end.clone(),
            },
        };

        let exact = match self.timers.schedule_exact(&payload) {
            Ok(()) => true,
            Err(TimerError::ExactDenied) => {
                tracing::warn!(%timer_id, "exact wake timers denied, falling back to inexact");
                match self.timers.schedule_inexact(&payload) {
                    Ok(()) => false,
                    Err(e) => {
                        tracing::warn!(%timer_id, error = %e, "inexact timer request failed");
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(%timer_id, error = %e, "timer backend declined request");
                return;
            }
        };

        let armed = ArmedTimer {
            timer_id,
            entry_id: payload.entry_id.clone(),
            boundary,
            occurrence: payload.occurrence,
            wake_at: payload.wake_at,
            exact,
        };
        if let Err(e) = self.ledger.set_armed(&armed) {
            tracing::warn!(%timer_id, error = %e, "failed to persist armed timer, cancelling it");
            self.timers.cancel(timer_id);
            return;
        }

        tracing::info!(
            %timer_id,
            entry = %payload.entry_id,
            %boundary,
            wake_at = %payload.wake_at,
            exact,
            "wake timer armed"
        );
        events.push(Event::TimerArmed {
            timer_id,
            entry_id: payload.entry_id,
            boundary,
            occurrence: payload.occurrence,
            wake_at: payload.wake_at,
            exact,
        });
    }

    fn cancel_armed(&self, armed: ArmedTimer, events: &mut Vec<Event>) {
        self.timers.cancel(armed.timer_id);
        if let Err(e) = self.ledger.clear_armed(armed.boundary) {
            tracing::warn!(error = %e, "failed to clear armed timer record");
        }
        tracing::debug!(timer_id = %armed.timer_id, entry = %armed.entry_id, "wake timer cancelled");
        events.push(Event::TimerCancelled {
            timer_id: armed.timer_id,
            entry_id: armed.entry_id,
            boundary: armed.boundary,
        });
    }

    fn cancel_all_locked(&self, events: &mut Vec<Event>) {
        for boundary in Boundary::ALL {
            match self.ledger.armed(boundary) {
                Ok(Some(armed)) => self.cancel_armed(armed, events),
                Ok(None) => {}
                Err(e) => tracing::warn!(%boundary, error = %e, "failed to read armed timer record"),
            }
        }
    }
}
