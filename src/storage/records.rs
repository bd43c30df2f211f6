//! History record store.
//!
//! Thread-safe via `RwLock`. Not durable: records are lost on restart.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use serde::Deserialize;
use std::sync::RwLock;

use crate::config::defaults::HISTORY_MAX_RECORDS;
use crate::forecast::linear_aqi;
use crate::types::HistoryRecord;

/// Header of the CSV produced by [`HistoryStore::export_csv`].
pub const CSV_EXPORT_HEADER: &str = "timestamp,AQI,PM2.5,PM10,NO2,CO";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("history store is empty")]
    Empty,
    #[error("invalid record: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("storage error: {0}")]
    Storage(String),
}

/// Fields a client supplies when adding a record. `no2` and `co` are
/// simulated when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRecord {
    pub timestamp: DateTime<Utc>,
    pub pm25: f64,
    pub pm10: f64,
    #[serde(default)]
    pub no2: Option<f64>,
    #[serde(default)]
    pub co: Option<f64>,
}

struct Inner {
    records: Vec<HistoryRecord>,
    next_id: u64,
}

pub struct HistoryStore {
    inner: RwLock<Inner>,
    max_records: usize,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: Vec::new(),
                next_id: 1,
            }),
            max_records: HISTORY_MAX_RECORDS,
        }
    }

    /// Store pre-populated with three readings over the two hours before `now`.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let seed = [
            (2, 75, 28.1, 45.0, 40.5, 3.1),
            (1, 90, 35.0, 55.0, 55.2, 4.5),
            (0, 82, 30.2, 48.0, 45.1, 3.8),
        ];
        let records: Vec<HistoryRecord> = seed
            .iter()
            .zip(1..)
            .map(|(&(hours_ago, aqi, pm25, pm10, no2, co), id)| HistoryRecord {
                id,
                timestamp: now - Duration::hours(hours_ago),
                aqi,
                pm25,
                pm10,
                no2,
                co,
            })
            .collect();
        let next_id = records.len() as u64 + 1;
        Self {
            inner: RwLock::new(Inner { records, next_id }),
            max_records: HISTORY_MAX_RECORDS,
        }
    }

    /// Cap the log at `max_records`, evicting the oldest beyond it.
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records.max(1);
        self
    }

    pub fn list(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(inner.records.clone())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(inner.records.len())
    }

    /// Append a record. AQI is derived from PM2.5 with the linear proxy.
    pub fn add(&self, new: NewRecord) -> Result<HistoryRecord, StoreError> {
        for (field, value) in [("pm25", new.pm25), ("pm10", new.pm10)] {
            if !value.is_finite() || value < 0.0 {
                return Err(StoreError::Invalid {
                    field,
                    reason: format!("must be a non-negative number, got {value}"),
                });
            }
        }

        let mut rng = rand::thread_rng();
        let no2 = new.no2.unwrap_or_else(|| round1(rng.gen_range(30.0..60.0)));
        let co = new.co.unwrap_or_else(|| round1(rng.gen_range(2.0..5.0)));

        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let record = HistoryRecord {
            id: inner.next_id,
            timestamp: new.timestamp,
            aqi: linear_aqi(new.pm25),
            pm25: new.pm25,
            pm10: new.pm10,
            no2,
            co,
        };
        inner.next_id += 1;
        inner.records.push(record.clone());

        // Evict oldest if over limit
        if inner.records.len() > self.max_records {
            inner.records.remove(0);
        }

        Ok(record)
    }

    /// Remove and return the most recently added record.
    pub fn delete_last(&self) -> Result<HistoryRecord, StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        inner.records.pop().ok_or(StoreError::Empty)
    }

    /// CSV of the records whose date falls within `[start, end]` (either
    /// bound optional, both inclusive).
    pub fn export_csv(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<String, StoreError> {
        let records = self.list()?;
        let mut csv = String::from(CSV_EXPORT_HEADER);
        csv.push('\n');
        for r in records.iter().filter(|r| {
            let day = r.timestamp.date_naive();
            start.map_or(true, |s| day >= s) && end.map_or(true, |e| day <= e)
        }) {
            csv.push_str(&format!(
                "{},{},{:.1},{:.1},{:.1},{:.1}\n",
                r.timestamp.format("%Y-%m-%d %H:%M"),
                r.aqi,
                r.pm25,
                r.pm10,
                r.no2,
                r.co
            ));
        }
        Ok(csv)
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
