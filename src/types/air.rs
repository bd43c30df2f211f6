//! Sensor measurement rows and the fixed feature schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of model input features.
pub const NUM_FEATURES: usize = 6;

/// Feature schema, in the column order every scaler and model is fit with.
///
/// Index 0 (`pm25_std`) is the forecast target.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "pm25_std",
    "pm10_std",
    "temperature",
    "humidity",
    "pressure",
    "co2",
];

/// Column index of the forecast target within [`FEATURE_NAMES`].
pub const TARGET_COLUMN: usize = 0;

/// Raw hourly measurement from the sensor station.
///
/// Field aliases accept the column names used by the station's CSV exports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// PM2.5 concentration (µg/m³)
    #[serde(alias = "PM2_5")]
    pub pm25: f64,
    /// PM10 concentration (µg/m³)
    #[serde(alias = "PM10")]
    pub pm10: f64,
    /// Ambient temperature (°C)
    #[serde(alias = "Temperatura")]
    pub temperature: f64,
    /// Relative humidity (%)
    #[serde(alias = "Humedad")]
    pub humidity: f64,
    /// Atmospheric pressure (hPa)
    #[serde(alias = "Presion")]
    pub pressure: f64,
    /// CO2 concentration (ppm)
    #[serde(alias = "CO2")]
    pub co2: f64,
}

impl FeatureRow {
    /// Named raw fields, for validation messages.
    pub fn named_fields(&self) -> [(&'static str, f64); NUM_FEATURES] {
        [
            ("pm25", self.pm25),
            ("pm10", self.pm10),
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("pressure", self.pressure),
            ("co2", self.co2),
        ]
    }
}

/// A [`FeatureRow`] with pressure/temperature-corrected particulate values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardizedFeatureRow {
    pub raw: FeatureRow,
    pub pm25_std: f64,
    pub pm10_std: f64,
}

impl StandardizedFeatureRow {
    /// Feature vector in [`FEATURE_NAMES`] order.
    pub fn features(&self) -> [f64; NUM_FEATURES] {
        [
            self.pm25_std,
            self.pm10_std,
            self.raw.temperature,
            self.raw.humidity,
            self.raw.pressure,
            self.raw.co2,
        ]
    }
}
