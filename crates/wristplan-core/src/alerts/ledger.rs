//! Persisted alert ledger.
//!
//! Key layout in the backing [`KeyValueStore`]:
//!
//! ```text
//! alert.{boundary}.{entry_id}  -> occurrence instant that already fired
//! armed.{boundary}             -> JSON ArmedTimer for the outstanding timer
//! timer.seq                    -> last issued timer id
//! ```
//!
//! A fired marker holds the absolute instant of the occurrence it belongs to.
//! A later occurrence of the same entry carries a different instant, so its
//! claim overwrites the marker and may fire again.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Boundary, TimerId};
use crate::error::DatabaseError;
use crate::storage::KeyValueStore;

const FIRED_PREFIX: &str = "alert.";
const ARMED_PREFIX: &str = "armed.";
const REQUEST_SEQ: &str = "timer.seq";
const STAMP: &str = "%Y-%m-%dT%H:%M:%S";
const SEQ_RETRIES: usize = 8;

/// The outstanding timer for one boundary kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmedTimer {
    pub timer_id: TimerId,
    pub entry_id: String,
    pub boundary: Boundary,
    pub occurrence: NaiveDateTime,
    pub wake_at: NaiveDateTime,
    pub exact: bool,
}

#[derive(Clone)]
pub struct AlertLedger {
    store: Arc<dyn KeyValueStore>,
}

impl AlertLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn fired_key(boundary: Boundary, entry_id: &str) -> String {
        format!("{FIRED_PREFIX}{boundary}.{entry_id}")
    }

    fn armed_key(boundary: Boundary) -> String {
        format!("{ARMED_PREFIX}{boundary}")
    }

    fn stamp(occurrence: NaiveDateTime) -> String {
        occurrence.format(STAMP).to_string()
    }

    /// Whether the alert for this exact occurrence already fired.
    pub fn has_fired(
        &self,
        entry_id: &str,
        boundary: Boundary,
        occurrence: NaiveDateTime,
    ) -> Result<bool, DatabaseError> {
        let current = self.store.get(&Self::fired_key(boundary, entry_id))?;
        Ok(current.as_deref() == Some(Self::stamp(occurrence).as_str()))
    }

    /// Atomically mark the occurrence as fired.
    ///
    /// Returns `true` for exactly one caller per occurrence; every later or
    /// concurrent caller gets `false`.
    pub fn claim(
        &self,
        entry_id: &str,
        boundary: Boundary,
        occurrence: NaiveDateTime,
    ) -> Result<bool, DatabaseError> {
        let key = Self::fired_key(boundary, entry_id);
        let stamp = Self::stamp(occurrence);
        let current = self.store.get(&key)?;
        if current.as_deref() == Some(stamp.as_str()) {
            return Ok(false);
        }
        self.store.compare_and_swap(&key, current.as_deref(), &stamp)
    }

    pub fn armed(&self, boundary: Boundary) -> Result<Option<ArmedTimer>, DatabaseError> {
        let Some(raw) = self.store.get(&Self::armed_key(boundary))? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(armed) => Ok(Some(armed)),
            Err(e) => {
                tracing::warn!(%boundary, error = %e, "discarding unreadable armed-timer record");
                self.store.remove(&Self::armed_key(boundary))?;
                Ok(None)
            }
        }
    }

    pub fn set_armed(&self, armed: &ArmedTimer) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(armed)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        self.store.put(&Self::armed_key(armed.boundary), &json)
    }

    pub fn clear_armed(&self, boundary: Boundary) -> Result<(), DatabaseError> {
        self.store.remove(&Self::armed_key(boundary))
    }

    /// Issue the next timer id from the persisted request sequence.
    pub fn next_request_id(&self) -> Result<TimerId, DatabaseError> {
        for _ in 0..SEQ_RETRIES {
            let current = self.store.get(REQUEST_SEQ)?;
            let last: i64 = current.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0);
            let next = last + 1;
            if self
                .store
                .compare_and_swap(REQUEST_SEQ, current.as_deref(), &next.to_string())?
            {
                return Ok(TimerId(next));
            }
        }
        Err(DatabaseError::Locked)
    }

    /// Fired markers as `(key, occurrence)` pairs, sorted by key.
    pub fn fired_markers(&self) -> Result<Vec<(String, String)>, DatabaseError> {
        let mut markers = Vec::new();
        for key in self.store.keys_with_prefix(FIRED_PREFIX)? {
            if let Some(value) = self.store.get(&key)? {
                markers.push((key, value));
            }
        }
        Ok(markers)
    }

    /// Drop every fired marker and armed record. Returns how many keys went.
    pub fn clear(&self) -> Result<usize, DatabaseError> {
        let mut removed = 0;
        for prefix in [FIRED_PREFIX, ARMED_PREFIX] {
            for key in self.store.keys_with_prefix(prefix)? {
                self.store.remove(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn ledger() -> AlertLedger {
        AlertLedger::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn claim_is_once_per_occurrence() {
        let ledger = ledger();
        assert!(ledger.claim("A@09:00", Boundary::Start, at(1, 9, 0)).unwrap());
        assert!(!ledger.claim("A@09:00", Boundary::Start, at(1, 9, 0)).unwrap());
        assert!(ledger.has_fired("A@09:00", Boundary::Start, at(1, 9, 0)).unwrap());
    }

    #[test]
    fn boundaries_and_entries_are_independent() {
        let ledger = ledger();
        assert!(ledger.claim("A@09:00", Boundary::Start, at(1, 9, 0)).unwrap());
        assert!(ledger.claim("A@09:00", Boundary::End, at(1, 10, 0)).unwrap());
        assert!(ledger.claim("B@09:00", Boundary::Start, at(1, 9, 0)).unwrap());
    }

    #[test]
    fn next_occurrence_rolls_over() {
        let ledger = ledger();
        assert!(ledger.claim("A@09:00", Boundary::Start, at(1, 9, 0)).unwrap());
        assert!(ledger.claim("A@09:00", Boundary::Start, at(2, 9, 0)).unwrap());
        assert!(!ledger.has_fired("A@09:00", Boundary::Start, at(1, 9, 0)).unwrap());
    }

    #[test]
    fn armed_record_round_trips() {
        let ledger = ledger();
        assert!(ledger.armed(Boundary::End).unwrap().is_none());
        let armed = ArmedTimer {
            timer_id: TimerId(3),
            entry_id: "A@09:00".into(),
            boundary: Boundary::End,
            occurrence: at(1, 10, 0),
            wake_at: at(1, 9, 59),
            exact: true,
        };
        ledger.set_armed(&armed).unwrap();
        assert_eq!(ledger.armed(Boundary::End).unwrap(), Some(armed));
        assert!(ledger.armed(Boundary::Start).unwrap().is_none());
        ledger.clear_armed(Boundary::End).unwrap();
        assert!(ledger.armed(Boundary::End).unwrap().is_none());
    }

    #[test]
    fn corrupt_armed_record_is_dropped() {
        let ledger = ledger();
        ledger.store().put("armed.start", "{not json").unwrap();
        assert!(ledger.armed(Boundary::Start).unwrap().is_none());
        assert!(ledger.store().get("armed.start").unwrap().is_none());
    }

    #[test]
    fn request_ids_increase() {
        let ledger = ledger();
        assert_eq!(ledger.next_request_id().unwrap(), TimerId(1));
        assert_eq!(ledger.next_request_id().unwrap(), TimerId(2));
    }

    #[test]
    fn clear_removes_markers_and_armed_records() {
        let ledger = ledger();
        ledger.claim("A@09:00", Boundary::Start, at(1, 9, 0)).unwrap();
        ledger
            .set_armed(&ArmedTimer {
                timer_id: TimerId(1),
                entry_id: "A@09:00".into(),
                boundary: Boundary::End,
                occurrence: at(1, 10, 0),
                wake_at: at(1, 9, 59),
                exact: false,
            })
            .unwrap();
        assert_eq!(ledger.fired_markers().unwrap().len(), 1);
        assert_eq!(ledger.clear().unwrap(), 2);
        assert!(ledger.fired_markers().unwrap().is_empty());
        assert_eq!(ledger.next_request_id().unwrap(), TimerId(1));
    }
}
