//! Forecast output and model provenance types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One hour of the AQI forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Hours ahead of the last observation (1-based).
    pub hour_offset: u32,
    /// Linear AQI proxy derived from `predicted_pm25_std`.
    pub predicted_aqi: i64,
    /// Predicted standardized PM2.5 (µg/m³).
    pub predicted_pm25_std: f64,
}

/// Hold-out evaluation metrics, in standardized PM2.5 units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

/// Provenance recorded alongside a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub model_name: String,
    pub trained_at: DateTime<Utc>,
    pub time_step: usize,
    pub feature_names: Vec<String>,
    pub train_windows: usize,
    pub test_windows: usize,
    /// `None` when the hold-out split was empty.
    pub metrics: Option<ModelMetrics>,
}
