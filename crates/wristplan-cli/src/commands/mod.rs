pub mod config;
pub mod face;
pub mod history;
pub mod ledger;
pub mod toggle;
pub mod watch;

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime};
use wristplan_core::error::Result;
use wristplan_core::storage::AlertMode;
use wristplan_core::{Config, Database, FaceEngine, NoTimers, Vibrator, WakeTimer};

pub type CliResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Everything a command needs from disk.
pub struct Host {
    pub config: Config,
    pub db: Arc<Database>,
}

impl Host {
    pub fn open() -> Result<Self> {
        let config = Config::load()?;
        let db = Arc::new(Database::open()?);
        Ok(Self { config, db })
    }

    /// Face engine over this host's config and database.
    pub fn engine(&self, timers: Arc<dyn WakeTimer>) -> Result<FaceEngine> {
        FaceEngine::from_config(&self.config, self.db.clone(), timers, Arc::new(TerminalVibrator))
    }

    /// Face engine for one-shot commands: no wake timers, ticks poll.
    pub fn polling_engine(&self) -> Result<FaceEngine> {
        let mut config = self.config.clone();
        config.alerts.mode = AlertMode::Poll;
        FaceEngine::from_config(&config, self.db.clone(), Arc::new(NoTimers), Arc::new(TerminalVibrator))
    }
}

/// Resolve `--at`: `HH:MM[:SS]` means today, otherwise a full local timestamp.
pub fn parse_at(at: Option<&str>) -> std::result::Result<NaiveDateTime, String> {
    let now = Local::now().naive_local();
    let Some(raw) = at else {
        return Ok(now);
    };
    for fmt in ["%H:%M", "%H:%M:%S"] {
        if let Ok(time) = NaiveTime::parse_from_str(raw, fmt) {
            return Ok(now.date().and_time(time));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(at);
        }
    }
    Err(format!("cannot parse time '{raw}'"))
}

/// Stand-in for the watch's vibration motor: rings the terminal bell.
pub struct TerminalVibrator;

impl Vibrator for TerminalVibrator {
    fn vibrate(&self, pattern: &[u64]) {
        let on_ms: u64 = pattern.iter().skip(1).step_by(2).sum();
        tracing::info!(?pattern, on_ms, "vibrate");
        eprint!("\x07");
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
