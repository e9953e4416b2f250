//! # Wristplan Core Library
//!
//! Schedule evaluation and alert timing for a watch face that overlays a
//! weekly plan of named time blocks on the clock. All logic lives here; the
//! `wristplan` CLI is a thin host that supplies the clock, wake timers and a
//! vibration output.
//!
//! ## Architecture
//!
//! - **Schedule**: weekly JSON document of day groups and entries
//! - **Resolver**: active and next entry for a moment, midnight and week aware
//! - **Progress**: elapsed/remaining/progress arithmetic and duration labels
//! - **Alerts**: at-most-once start and before-end vibration, deduplicated
//!   through a persisted ledger
//! - **Storage**: SQLite key-value store and TOML configuration
//!
//! ## Key Components
//!
//! - [`FaceEngine`]: one render tick of the overlay
//! - [`AlertScheduler`]: alert state machine and wake-timer arming
//! - [`Database`]: persisted ledger, feature flags and alert history
//! - [`Config`]: application configuration management

pub mod alerts;
pub mod error;
pub mod events;
pub mod face;
pub mod progress;
pub mod resolver;
pub mod schedule;
pub mod storage;

pub use alerts::{
    AlertLedger, AlertPayload, AlertPhase, AlertScheduler, AlertSettings, Boundary, NoTimers,
    TimerId, TokioTimers, Vibrator, WakeTimer,
};
pub use error::{ConfigError, CoreError, DatabaseError, ScheduleError, TimerError};
pub use events::Event;
pub use face::{FaceEngine, FaceSnapshot, TickOutput};
pub use resolver::{Occurrence, ResolvedState};
pub use schedule::{DaySchedule, ScheduleEntry, SortKey, WeekSchedule};
pub use storage::{Config, Database, KeyValueStore, MemoryStore};
