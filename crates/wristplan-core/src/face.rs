//! Face engine: one render tick of the schedule overlay.
//!
//! The engine holds no clock and no thread. The host calls [`FaceEngine::tick`]
//! on every render and [`FaceEngine::on_timer`] whenever a wake timer comes
//! back, passing the current local time each time.
//!
//! ```ignore
//! let engine = FaceEngine::from_config(&config, db, timers, vibrator)?;
//! loop {
//!     let out = engine.tick(Local::now().naive_local());
//!     draw(&out.snapshot);
//! }
//! ```

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::alerts::{AlertPayload, AlertPhase, AlertScheduler, AlertSettings, Vibrator, WakeTimer};
use crate::error::Result;
use crate::events::Event;
use crate::progress;
use crate::resolver::{Occurrence, ResolvedState};
use crate::schedule::{ScheduleEntry, WeekSchedule};
use crate::storage::{
    Config, Database, KeyValueStore, UiConfig, SCHEDULE_FLAG, VIBRATION_FLAG,
};

/// What the overlay shows for the entry in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveView {
    pub entry_id: String,
    pub name: String,
    pub habits: Vec<String>,
    /// `HH:mm - HH:mm`
    pub window: String,
    /// `{total} | HH:mm - HH:mm`
    pub summary: String,
    pub elapsed: String,
    pub remaining: String,
    pub elapsed_secs: i64,
    pub remaining_secs: i64,
    pub total_secs: i64,
    /// Fraction of the entry elapsed, in `[0, 1]`.
    pub progress: f64,
    /// Tick marks on the progress arc, one per quarter hour plus the origin.
    pub quarter_marks: u32,
    pub phase: AlertPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextView {
    pub entry_id: String,
    pub name: String,
    pub window: String,
    pub starts_at: NaiveDateTime,
    pub days_ahead: u32,
    pub phase: AlertPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSnapshot {
    pub at: NaiveDateTime,
    pub schedule_enabled: bool,
    pub vibration_enabled: bool,
    pub colors: UiConfig,
    pub active: Option<ActiveView>,
    pub next: Option<NextView>,
}

#[derive(Debug, Clone)]
pub struct TickOutput {
    pub snapshot: FaceSnapshot,
    pub events: Vec<Event>,
}

pub struct FaceEngine {
    schedule: WeekSchedule,
    store: Arc<dyn KeyValueStore>,
    alerts: AlertScheduler,
    history: Option<Arc<Database>>,
    colors: UiConfig,
}

impl FaceEngine {
    pub fn new(schedule: WeekSchedule, store: Arc<dyn KeyValueStore>, alerts: AlertScheduler) -> Self {
        Self {
            schedule,
            store,
            alerts,
            history: None,
            colors: UiConfig::default(),
        }
    }

    /// Wire an engine from host configuration: the configured schedule
    /// document, alert settings and face colors, with `db` as both the
    /// flag store and the alert history.
    ///
    /// # Errors
    /// Returns [`CoreError::Schedule`](crate::CoreError::Schedule) if the
    /// schedule document cannot be loaded.
    pub fn from_config(
        config: &Config,
        db: Arc<Database>,
        timers: Arc<dyn WakeTimer>,
        vibrator: Arc<dyn Vibrator>,
    ) -> Result<Self> {
        let schedule = config.week_schedule()?;
        let settings = AlertSettings::from(&config.alerts);
        let alerts = AlertScheduler::new(db.clone(), timers, vibrator, settings);
        Ok(Self::new(schedule, db.clone(), alerts)
            .with_history(db)
            .with_colors(config.ui.clone()))
    }

    /// Record every fired alert in `db`'s history table.
    pub fn with_history(mut self, db: Arc<Database>) -> Self {
        self.history = Some(db);
        self
    }

    pub fn with_colors(mut self, colors: UiConfig) -> Self {
        self.colors = colors;
        self
    }

    pub fn schedule(&self) -> &WeekSchedule {
        &self.schedule
    }

    pub fn alerts(&self) -> &AlertScheduler {
        &self.alerts
    }

    pub fn schedule_enabled(&self) -> bool {
        self.store.flag(SCHEDULE_FLAG, true)
    }

    /// One render tick: drive the alert scheduler, then describe the face.
    pub fn tick(&self, now: NaiveDateTime) -> TickOutput {
        let events = if self.schedule_enabled() {
            self.alerts.on_tick(now, &self.schedule)
        } else {
            self.alerts.cancel_all()
        };
        self.record(&events);
        TickOutput {
            snapshot: self.snapshot(now),
            events,
        }
    }

    /// A wake timer came back.
    pub fn on_timer(&self, payload: &AlertPayload, now: NaiveDateTime) -> Vec<Event> {
        let events = self.alerts.on_timer(payload, now);
        self.record(&events);
        events
    }

    /// Describe the face at `now` without touching alerts.
    pub fn snapshot(&self, now: NaiveDateTime) -> FaceSnapshot {
        let schedule_enabled = self.schedule_enabled();
        let vibration_enabled = self.store.flag(VIBRATION_FLAG, true);
        let mut snapshot = FaceSnapshot {
            at: now,
            schedule_enabled,
            vibration_enabled,
            colors: self.colors.clone(),
            active: None,
            next: None,
        };
        if !schedule_enabled {
            return snapshot;
        }

        let state = ResolvedState::resolve(now.time(), now.weekday(), &self.schedule);
        snapshot.active = state
            .active
            .map(|entry| self.active_view(entry, &state, now));
        snapshot.next = state.next.map(|entry| {
            let occ = Occurrence::upcoming(entry, now.date(), state.next_days_ahead);
            NextView {
                entry_id: entry.id(),
                name: entry.name.clone(),
                window: entry.window_label(),
                starts_at: occ.start_at,
                days_ahead: state.next_days_ahead,
                phase: self.alerts.phase(&occ),
            }
        });
        snapshot
    }

    fn active_view(
        &self,
        entry: &ScheduleEntry,
        state: &ResolvedState<'_>,
        now: NaiveDateTime,
    ) -> ActiveView {
        let total = Duration::seconds(state.total_secs);
        let elapsed = Duration::seconds(state.elapsed_secs);
        let remaining = total - elapsed;
        ActiveView {
            entry_id: entry.id(),
            name: entry.name.clone(),
            habits: entry.habits.clone(),
            window: entry.window_label(),
            summary: format!(
                "{} | {}",
                progress::format_duration(total),
                entry.window_label()
            ),
            elapsed: progress::format_duration(elapsed),
            remaining: progress::format_duration(remaining),
            elapsed_secs: state.elapsed_secs,
            remaining_secs: remaining.num_seconds(),
            total_secs: state.total_secs,
            progress: state.progress(),
            quarter_marks: progress::quarter_hour_marks(entry.start, entry.end),
            phase: self.alerts.phase(&Occurrence::active_at(entry, now)),
        }
    }

    fn record(&self, events: &[Event]) {
        let Some(db) = &self.history else {
            return;
        };
        for event in events {
            if let Event::AlertFired {
                entry_id,
                boundary,
                occurrence,
                at,
                ..
            } = event
            {
                if let Err(e) = db.record_alert(entry_id, *boundary, *occurrence, *at) {
                    tracing::warn!(entry = %entry_id, error = %e, "failed to record alert history");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertSettings, NoTimers, Vibrator};
    use crate::schedule::DaySchedule;
    use crate::error::{CoreError, ScheduleError};
    use crate::storage::{AlertMode, MemoryStore};
    use chrono::{NaiveDate, NaiveTime, Weekday};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Buzz(AtomicUsize);

    impl Vibrator for Buzz {
        fn vibrate(&self, _pattern: &[u64]) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2026-06-03 is a Wednesday.
    fn wednesday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 3).unwrap().and_time(t(h, m))
    }

    fn engine(store: Arc<MemoryStore>, buzz: Arc<Buzz>) -> FaceEngine {
        let schedule = WeekSchedule {
            groups: vec![DaySchedule {
                days: vec![Weekday::Wed],
                entries: vec![ScheduleEntry {
                    name: "Work".into(),
                    start: t(9, 0),
                    end: t(10, 0),
                    habits: vec!["Water".into()],
                    vibrate_on_start: vec![0, 300],
                    vibrate_before_end: vec![0, 100],
                    vibrate_before_end_lead_secs: 60,
                }],
            }],
        };
        let settings = AlertSettings {
            mode: AlertMode::Poll,
            ..AlertSettings::default()
        };
        let alerts = AlertScheduler::new(store.clone(), Arc::new(NoTimers), buzz, settings);
        FaceEngine::new(schedule, store, alerts)
    }

    #[test]
    fn active_view_describes_progress() {
        let engine = engine(Arc::new(MemoryStore::new()), Arc::default());
        let snap = engine.snapshot(wednesday(9, 30));
        let active = snap.active.unwrap();
        assert_eq!(active.name, "Work");
        assert_eq!(active.summary, "1h | 09:00 - 10:00");
        assert_eq!(active.elapsed, "30m");
        assert_eq!(active.remaining, "30m");
        assert!((active.progress - 0.5).abs() < f64::EPSILON);
        assert_eq!(active.quarter_marks, 5);
        assert_eq!(active.phase, AlertPhase::Idle);

        let next = snap.next.unwrap();
        assert_eq!(next.days_ahead, 7);
        assert_eq!(next.starts_at, wednesday(9, 0) + chrono::Duration::days(7));
    }

    #[test]
    fn tick_fires_start_alert_and_reports_phase() {
        let buzz = Arc::new(Buzz::default());
        let engine = engine(Arc::new(MemoryStore::new()), buzz.clone());
        let out = engine.tick(wednesday(9, 0) + chrono::Duration::seconds(1));
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.snapshot.active.unwrap().phase, AlertPhase::StartFired);
        engine.tick(wednesday(9, 1));
        assert_eq!(buzz.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn schedule_toggle_hides_overlay_and_silences_alerts() {
        let store = Arc::new(MemoryStore::new());
        let buzz = Arc::new(Buzz::default());
        store.set_flag(SCHEDULE_FLAG, false).unwrap();
        let engine = engine(store, buzz.clone());
        let out = engine.tick(wednesday(9, 0) + chrono::Duration::seconds(1));
        assert!(!out.snapshot.schedule_enabled);
        assert!(out.snapshot.active.is_none());
        assert!(out.events.is_empty());
        assert_eq!(buzz.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fired_alerts_land_in_history() {
        let db = Arc::new(Database::open_memory().unwrap());
        let engine = engine(Arc::new(MemoryStore::new()), Arc::default()).with_history(db.clone());
        engine.tick(wednesday(9, 59));
        let history = db.recent_alerts(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].entry_id, "Work@09:00");
    }

    #[test]
    fn snapshot_carries_face_colors() {
        let engine = engine(Arc::new(MemoryStore::new()), Arc::default());
        assert_eq!(engine.snapshot(wednesday(9, 30)).colors, UiConfig::default());

        let colors = UiConfig {
            primary_color: "#ffffff".into(),
            secondary_color: "#000000".into(),
        };
        let engine = engine.with_colors(colors.clone());
        assert_eq!(engine.snapshot(wednesday(9, 30)).colors, colors);
        engine.store.set_flag(SCHEDULE_FLAG, false).unwrap();
        assert_eq!(engine.snapshot(wednesday(9, 30)).colors, colors);
    }

    #[test]
    fn from_config_wires_schedule_and_colors() {
        let mut config = Config::default();
        config.ui.primary_color = "#123456".into();
        let db = Arc::new(Database::open_memory().unwrap());
        let engine =
            FaceEngine::from_config(&config, db.clone(), Arc::new(NoTimers), Arc::new(Buzz::default()))
                .unwrap();
        assert!(engine.schedule().entry_count() > 0);
        let snap = engine.snapshot(wednesday(9, 30));
        assert_eq!(snap.colors.primary_color, "#123456");
        assert_eq!(engine.alerts().settings().mode, AlertMode::Timer);
    }

    #[test]
    fn from_config_reports_missing_schedule() {
        let mut config = Config::default();
        config.schedule.path = Some("/nonexistent/wristplan/plan.json".into());
        let db = Arc::new(Database::open_memory().unwrap());
        let result =
            FaceEngine::from_config(&config, db, Arc::new(NoTimers), Arc::new(Buzz::default()));
        assert!(matches!(
            result,
            Err(CoreError::Schedule(ScheduleError::ReadFailed { .. }))
        ));
    }
}
