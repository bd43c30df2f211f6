//! Monitoring API payloads: history log records and live readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::forecast::AqiCategory;

/// One row of the in-memory history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub aqi: i64,
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub co: f64,
}

/// Latest sensor reading as served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentReading {
    pub timestamp: DateTime<Utc>,
    pub aqi: i64,
    pub category: AqiCategory,
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub co: f64,
    /// True when the live feed was unavailable and values are synthetic.
    pub simulated: bool,
}
