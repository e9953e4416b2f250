//! Core error types for wristplan-core.
//!
//! Load-time failures (malformed schedule documents, unreadable config) are
//! surfaced to the caller. Render-path failures (store hiccups, timer
//! denials) are logged and absorbed by the scheduler instead.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for wristplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Schedule document errors
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Persisted store errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Wake timer errors
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while loading a schedule document.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// The document could not be read from disk
    #[error("Failed to read schedule from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON or does not match the schedule shape
    #[error("Malformed schedule document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A time-of-day value is not strict 24-hour `HH:mm`
    #[error("Invalid time '{value}': expected 24-hour HH:mm")]
    InvalidTime { value: String },

    /// An entry has no name, so it cannot be identified in the ledger
    #[error("Entry {index} in day group {group} has an empty name")]
    EmptyName { group: usize, index: usize },
}

/// Persisted store errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another writer
    #[error("Database is locked")]
    Locked,

    /// A thread panicked while holding the connection
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not exist in the configuration
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The data directory could not be created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Errors reported by a wake timer backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The platform refused a precise wake-capable timer
    #[error("Exact wake timers are not permitted")]
    ExactDenied,

    /// The backend cannot accept timers right now
    #[error("Timer backend unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
