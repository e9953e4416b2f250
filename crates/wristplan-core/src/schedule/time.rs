//! Strict 24-hour `HH:mm` time-of-day codec.

use chrono::NaiveTime;

use crate::error::ScheduleError;

const HHMM: &str = "%H:%M";

/// Parse a strict `HH:mm` string.
///
/// Both fields must be exactly two digits; `9:00` and `09:00:00` are rejected.
pub fn parse_hhmm(value: &str) -> Result<NaiveTime, ScheduleError> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 5
        && bytes[2] == b':'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || b.is_ascii_digit());
    if !shape_ok {
        return Err(ScheduleError::InvalidTime {
            value: value.to_string(),
        });
    }
    NaiveTime::parse_from_str(value, HHMM).map_err(|_| ScheduleError::InvalidTime {
        value: value.to_string(),
    })
}

/// Render a time-of-day as `HH:mm`.
pub fn format_hhmm(time: NaiveTime) -> String {
    time.format(HHMM).to_string()
}

/// Serde adapter for `NaiveTime` fields stored as `HH:mm`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_hhmm(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hhmm(&raw).map_err(serde::de::Error::custom)
    }
}
