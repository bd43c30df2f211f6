//! Forecasting pipeline: standard-conditions normalization, min-max
//! scaling, sequence windowing and autoregressive 24-hour AQI prediction.
//!
//! ## Data flow
//!
//! ```text
//! FeatureRow ──► normalizer ──► scaler ──► windower ──► Regressor::fit     (training)
//! FeatureRow ──► normalizer ──► scaler ──► last 24 rows ──► predict ×24    (serving)
//!                                                  └─► invert ──► AQI proxy
//! ```
//!
//! The engine runs in one of two modes fixed at construction: `Ready` when a
//! trained regressor and a matching scaler are available, `Degraded`
//! otherwise. A degraded engine synthesizes placeholder forecasts so the
//! serving API never fails for lack of a model.

pub mod aqi;
pub mod artifacts;
pub mod engine;
pub mod normalizer;
pub mod regressor;
pub mod reservoir;
pub mod scaler;
pub mod service;
pub mod training;
pub mod windower;

pub use aqi::{linear_aqi, AqiCategory};
pub use artifacts::{ArtifactPair, ArtifactStore, FileArtifactStore, LoadError, SaveError, TrainedModel};
pub use engine::{DegradedReason, EngineMode, ForecastEngine};
pub use regressor::{PersistenceRegressor, Regressor};
pub use reservoir::{ReservoirConfig, ReservoirRegressor};
pub use scaler::{DegeneratePolicy, FeatureScaler, FittedScaler};
pub use service::ForecastService;
pub use training::{train, ModelKind, TrainingConfig};
pub use windower::{window, Window, DEFAULT_TIME_STEP};

use thiserror::Error;

/// Default forecast horizon (hours).
pub const DEFAULT_HORIZON: usize = 24;

/// Errors raised by the forecasting pipeline.
///
/// Fit/training errors propagate to the caller. Per-request input errors
/// (schema, history length) propagate as well; only missing or inconsistent
/// artifacts switch an engine into degraded mode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// Physically impossible or non-finite input.
    #[error("invalid measurement: {field} = {value} ({reason})")]
    InvalidMeasurement {
        field: String,
        value: f64,
        reason: &'static str,
    },

    /// Zero-variance feature column at scaler fit time.
    #[error("degenerate column '{column}': every value is {value}")]
    DegenerateColumn { column: String, value: f64 },

    /// Too few rows to fit or window.
    #[error("insufficient data: need at least {required} rows, got {available}")]
    InsufficientData { required: usize, available: usize },

    /// Too few input rows to seed the prediction window.
    #[error("insufficient history: need at least {required} rows, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    /// Too few caller-supplied future covariate rows for the horizon.
    #[error("insufficient covariates: need {required} future rows, got {available}")]
    InsufficientCovariates { required: usize, available: usize },

    /// Feature count/order mismatch between scaler, model and input.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Regressor failed to fit or produced an unusable value.
    #[error("model error: {0}")]
    Model(String),
}
