//! AirViewer: air-quality monitoring and 24-hour AQI forecasting
//!
//! ## Architecture
//!
//! - **Dataset**: hourly station history (CSV load/save, synthetic generator)
//! - **Forecast**: normalization, scaling, windowing, trained regressors and
//!   the Ready/Degraded forecast engine
//! - **Sensors**: live ThingSpeak readings with a simulated fallback
//! - **Storage**: in-memory history log with CSV export
//! - **API**: Axum HTTP surface for the dashboard

pub mod api;
pub mod config;
pub mod dataset;
pub mod forecast;
pub mod sensors;
pub mod storage;
pub mod types;

pub use config::AppConfig;

pub use types::{
    CurrentReading, FeatureRow, ForecastPoint, HistoryRecord, ModelMetrics,
    StandardizedFeatureRow,
};

pub use forecast::{
    ArtifactStore, EngineMode, FileArtifactStore, ForecastEngine, ForecastError,
    ForecastService,
};

pub use storage::HistoryStore;
