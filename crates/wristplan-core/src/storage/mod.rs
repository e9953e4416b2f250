mod config;
pub mod database;
mod store;

pub use config::{AlertMode, AlertsConfig, Config, ScheduleConfig, UiConfig};
pub use database::{AlertRecord, Database};
pub use store::{KeyValueStore, MemoryStore, SCHEDULE_FLAG, VIBRATION_FLAG};

use std::path::PathBuf;

/// Returns `~/.config/wristplan[-dev]/` based on WRISTPLAN_ENV.
///
/// Set WRISTPLAN_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("WRISTPLAN_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("wristplan-dev")
    } else {
        base_dir.join("wristplan")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
