use clap::ValueEnum;
use wristplan_core::storage::{SCHEDULE_FLAG, VIBRATION_FLAG};
use wristplan_core::{Database, KeyValueStore};

use super::CliResult;

#[derive(Clone, Copy, ValueEnum)]
pub enum Flag {
    /// Schedule overlay on the face
    Schedule,
    /// Vibration alerts
    Vibration,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum State {
    On,
    Off,
}

impl Flag {
    fn key(self) -> &'static str {
        match self {
            Flag::Schedule => SCHEDULE_FLAG,
            Flag::Vibration => VIBRATION_FLAG,
        }
    }
}

pub fn run(flag: Flag, state: Option<State>) -> CliResult {
    let db = Database::open()?;
    if let Some(state) = state {
        db.set_flag(flag.key(), matches!(state, State::On))?;
    }
    let on = db.flag(flag.key(), true);
    println!("{}: {}", flag.key(), if on { "on" } else { "off" });
    Ok(())
}
