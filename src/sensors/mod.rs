//! Live sensor readings.
//!
//! [`ThingSpeakFeed`] reads the station's ThingSpeak channel;
//! [`SimulatedFeed`] stands in whenever the channel is disabled or
//! unreachable, so the dashboard always has a current reading.

pub mod simulated;
pub mod thingspeak;

pub use simulated::SimulatedFeed;
pub use thingspeak::ThingSpeakFeed;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::forecast::{linear_aqi, AqiCategory};
use crate::types::CurrentReading;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("feed has no usable value for {0}")]
    MissingField(&'static str),
    #[error("feed value for {field} is not a number: '{raw}'")]
    BadValue { field: &'static str, raw: String },
}

/// One pollutant sample from a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp: DateTime<Utc>,
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub co: f64,
    pub temperature: Option<f64>,
}

/// Source of the latest station sample.
#[async_trait]
pub trait SensorFeed: Send + Sync {
    async fn latest(&self) -> Result<SensorSample, SensorError>;

    /// Name for logs (e.g. "thingspeak", "simulated").
    fn feed_name(&self) -> &str;
}

/// Build the dashboard reading from a sample. Values are rounded to one
/// decimal; AQI uses the linear PM2.5 proxy.
pub fn to_reading(sample: &SensorSample, simulated: bool) -> CurrentReading {
    let aqi = linear_aqi(sample.pm25);
    CurrentReading {
        timestamp: sample.timestamp,
        aqi,
        category: AqiCategory::from_aqi(aqi),
        pm25: round1(sample.pm25),
        pm10: round1(sample.pm10),
        no2: round1(sample.no2),
        co: round1(sample.co),
        simulated,
    }
}

/// Latest reading from `feed`, or a simulated one if `feed` is absent or
/// fails.
pub async fn current_reading(feed: Option<&dyn SensorFeed>, fallback: &SimulatedFeed) -> CurrentReading {
    if let Some(feed) = feed {
        match feed.latest().await {
            Ok(sample) => return to_reading(&sample, false),
            Err(e) => {
                tracing::warn!(feed = feed.feed_name(), error = %e, "Sensor feed unavailable, using simulated reading");
            }
        }
    }
    to_reading(&fallback.sample(), true)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
