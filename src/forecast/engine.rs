//! Forecast engine: artifact-pair ownership and the autoregressive loop.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::types::{ArtifactMetadata, FeatureRow, ForecastPoint, FEATURE_NAMES, TARGET_COLUMN};

use super::aqi::linear_aqi;
use super::normalizer::standardize_rows;
use super::{ArtifactPair, ArtifactStore, FittedScaler, ForecastError, LoadError, Regressor};

/// AQI around which degraded forecasts are synthesized.
pub const DEGRADED_BASE_AQI: i64 = 100;

/// Maximum absolute jitter applied to [`DEGRADED_BASE_AQI`].
pub const DEGRADED_AQI_JITTER: i64 = 10;

/// Engine operating mode, fixed for the lifetime of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineMode {
    Ready,
    Degraded,
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "READY"),
            Self::Degraded => write!(f, "DEGRADED"),
        }
    }
}

/// Why an engine is degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DegradedReason {
    /// No artifacts were ever written.
    NotFound,
    /// Artifacts exist but could not be read or parsed.
    LoadFailed(String),
    /// Model and scaler disagree with each other or with the feature schema.
    Inconsistent(String),
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no trained artifacts"),
            Self::LoadFailed(e) => write!(f, "artifact load failed: {e}"),
            Self::Inconsistent(e) => write!(f, "inconsistent artifacts: {e}"),
        }
    }
}

#[derive(Debug)]
struct ReadyState {
    model: Arc<dyn Regressor>,
    scaler: FittedScaler,
    metadata: Option<ArtifactMetadata>,
}

#[derive(Debug)]
enum EngineState {
    Ready(ReadyState),
    Degraded(DegradedReason),
}

/// Owns one artifact pair (or none) and answers forecast requests.
///
/// Forecasting takes `&self`; the model and scaler are never mutated after
/// construction, so one engine can serve concurrent requests.
#[derive(Debug)]
pub struct ForecastEngine {
    state: EngineState,
    time_step: usize,
}

impl ForecastEngine {
    /// Build a ready engine, checking the model and scaler agree with the
    /// feature schema and with `time_step`.
    pub fn ready(
        model: Arc<dyn Regressor>,
        scaler: FittedScaler,
        time_step: usize,
    ) -> Result<Self, ForecastError> {
        if time_step == 0 {
            return Err(ForecastError::SchemaMismatch(
                "time_step must be at least 1".to_string(),
            ));
        }
        scaler.validate()?;
        if !scaler.matches_schema(&FEATURE_NAMES) {
            return Err(ForecastError::SchemaMismatch(format!(
                "scaler fit on {:?}, engine expects {:?}",
                scaler.feature_names(),
                FEATURE_NAMES
            )));
        }
        if !model.is_fitted() {
            return Err(ForecastError::Model(format!(
                "{} regressor is not fitted",
                model.name()
            )));
        }
        model.validate()?;
        if let Some(column) = model.target_column() {
            if column != TARGET_COLUMN {
                return Err(ForecastError::SchemaMismatch(format!(
                    "{} regressor reads column {column}, engine forecasts column {TARGET_COLUMN}",
                    model.name()
                )));
            }
        }
        if let Some((model_steps, model_width)) = model.input_shape() {
            if model_steps != time_step || model_width != scaler.width() {
                return Err(ForecastError::SchemaMismatch(format!(
                    "model expects {model_steps}x{model_width} windows, engine uses {time_step}x{}",
                    scaler.width()
                )));
            }
        }

        Ok(Self {
            state: EngineState::Ready(ReadyState {
                model,
                scaler,
                metadata: None,
            }),
            time_step,
        })
    }

    /// An engine that only produces synthetic forecasts.
    pub fn degraded(reason: DegradedReason, time_step: usize) -> Self {
        Self {
            state: EngineState::Degraded(reason),
            time_step,
        }
    }

    /// Ready when `pair` is present and consistent, degraded otherwise.
    pub fn from_artifacts(pair: Option<ArtifactPair>, time_step: usize) -> Self {
        let Some(pair) = pair else {
            return Self::degraded(DegradedReason::NotFound, time_step);
        };

        if pair.metadata.time_step != time_step {
            let reason = format!(
                "artifacts trained with time_step {}, engine configured for {time_step}",
                pair.metadata.time_step
            );
            warn!(%reason, "Artifacts rejected, forecasting in degraded mode");
            return Self::degraded(DegradedReason::Inconsistent(reason), time_step);
        }

        let metadata = pair.metadata;
        match Self::ready(pair.model, pair.scaler, time_step) {
            Ok(mut engine) => {
                if let EngineState::Ready(state) = &mut engine.state {
                    state.metadata = Some(metadata);
                }
                engine
            }
            Err(e) => {
                warn!(error = %e, "Artifacts rejected, forecasting in degraded mode");
                Self::degraded(DegradedReason::Inconsistent(e.to_string()), time_step)
            }
        }
    }

    /// Load artifacts from `store`. Never fails: every load error yields a
    /// degraded engine.
    pub fn load(store: &dyn ArtifactStore, time_step: usize) -> Self {
        match store.load() {
            Ok(pair) => {
                let engine = Self::from_artifacts(Some(pair), time_step);
                if engine.mode() == EngineMode::Ready {
                    info!(
                        location = %store.location(),
                        model = engine.model_name().unwrap_or_default(),
                        time_step,
                        "Forecast engine ready"
                    );
                }
                engine
            }
            Err(LoadError::NotFound(path)) => {
                warn!(
                    path = %path.display(),
                    "No trained model found, forecasting in degraded mode (run `airviewer train`)"
                );
                Self::degraded(DegradedReason::NotFound, time_step)
            }
            Err(e) => {
                error!(location = %store.location(), error = %e, "Failed to load model artifacts, forecasting in degraded mode");
                Self::degraded(DegradedReason::LoadFailed(e.to_string()), time_step)
            }
        }
    }

    pub fn mode(&self) -> EngineMode {
        match self.state {
            EngineState::Ready(_) => EngineMode::Ready,
            EngineState::Degraded(_) => EngineMode::Degraded,
        }
    }

    pub fn degraded_reason(&self) -> Option<&DegradedReason> {
        match &self.state {
            EngineState::Ready(_) => None,
            EngineState::Degraded(reason) => Some(reason),
        }
    }

    pub fn time_step(&self) -> usize {
        self.time_step
    }

    pub fn metadata(&self) -> Option<&ArtifactMetadata> {
        match &self.state {
            EngineState::Ready(state) => state.metadata.as_ref(),
            EngineState::Degraded(_) => None,
        }
    }

    pub fn model_name(&self) -> Option<&str> {
        match &self.state {
            EngineState::Ready(state) => Some(state.model.name()),
            EngineState::Degraded(_) => None,
        }
    }

    /// Forecast `horizon` hours past the last of `rows`.
    ///
    /// Non-target features of each predicted step hold the values of the
    /// last observed row.
    pub fn forecast(
        &self,
        rows: &[FeatureRow],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        match &self.state {
            EngineState::Degraded(_) => Ok(synthetic_forecast(horizon)),
            EngineState::Ready(state) => self.run(state, rows, None, horizon),
        }
    }

    /// Forecast with caller-supplied covariates for every future hour.
    ///
    /// `future[h]` provides the non-target features of hour `h + 1`; its
    /// particulate fields are ignored in favor of the model's prediction.
    pub fn forecast_with_covariates(
        &self,
        rows: &[FeatureRow],
        future: &[FeatureRow],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        match &self.state {
            EngineState::Degraded(_) => Ok(synthetic_forecast(horizon)),
            EngineState::Ready(state) => self.run(state, rows, Some(future), horizon),
        }
    }

    fn run(
        &self,
        state: &ReadyState,
        rows: &[FeatureRow],
        future: Option<&[FeatureRow]>,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let standardized = standardize_rows(rows)?;
        if standardized.len() < self.time_step {
            return Err(ForecastError::InsufficientHistory {
                required: self.time_step,
                available: standardized.len(),
            });
        }

        let future_scaled = match future {
            Some(future) => {
                if future.len() < horizon {
                    return Err(ForecastError::InsufficientCovariates {
                        required: horizon,
                        available: future.len(),
                    });
                }
                let rows = standardize_rows(&future[..horizon])?;
                let scaled = rows
                    .iter()
                    .map(|r| state.scaler.apply(&r.features()))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(scaled)
            }
            None => None,
        };

        let mut window: VecDeque<Vec<f64>> = standardized[standardized.len() - self.time_step..]
            .iter()
            .map(|r| state.scaler.apply(&r.features()))
            .collect::<Result<_, _>>()?;

        let mut points = Vec::with_capacity(horizon);
        for step in 0..horizon {
            let scaled = state.model.predict(window.make_contiguous())?;
            if !scaled.is_finite() {
                return Err(ForecastError::Model(format!(
                    "{} produced a non-finite value at hour {}",
                    state.model.name(),
                    step + 1
                )));
            }
            let pm25_std = state.scaler.invert(scaled, TARGET_COLUMN)?;

            points.push(ForecastPoint {
                hour_offset: hour_offset(step),
                predicted_aqi: linear_aqi(pm25_std),
                predicted_pm25_std: pm25_std,
            });

            let mut next = match &future_scaled {
                Some(future) => future[step].clone(),
                None => window.back().cloned().unwrap_or_default(),
            };
            if let Some(target) = next.get_mut(TARGET_COLUMN) {
                *target = scaled;
            }
            window.pop_front();
            window.push_back(next);
        }

        Ok(points)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn hour_offset(step: usize) -> u32 {
    (step + 1).min(u32::MAX as usize) as u32
}

/// Placeholder forecast for a degraded engine: AQI jittered around
/// [`DEGRADED_BASE_AQI`], PM2.5 rising half a unit per hour from 30.
fn synthetic_forecast(horizon: usize) -> Vec<ForecastPoint> {
    let mut rng = rand::thread_rng();
    (0..horizon)
        .map(|step| {
            let hour = hour_offset(step);
            let jitter = rng.gen_range(-DEGRADED_AQI_JITTER..=DEGRADED_AQI_JITTER);
            ForecastPoint {
                hour_offset: hour,
                predicted_aqi: (DEGRADED_BASE_AQI + jitter).max(0),
                predicted_pm25_std: 30.0 + 0.5 * f64::from(hour),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{
        window, FeatureScaler, FileArtifactStore, PersistenceRegressor, ReservoirConfig,
        ReservoirRegressor, TrainedModel,
    };
    use chrono::Utc;

    fn row(pm25: f64) -> FeatureRow {
        FeatureRow {
            timestamp: None,
            pm25,
            pm10: 70.0,
            temperature: 25.0,
            humidity: 80.0,
            pressure: 1013.25,
            co2: 600.0,
        }
    }

    /// Scaler fit on the static row repeated 30 times with ±epsilon noise.
    fn static_scaler() -> FittedScaler {
        let base = [40.0, 70.0, 25.0, 80.0, 1013.25, 600.0];
        let matrix: Vec<Vec<f64>> = (0..30)
            .map(|i| {
                let eps = if i % 2 == 0 { 1e-3 } else { -1e-3 };
                base.iter().map(|v| v + eps).collect()
            })
            .collect();
        FeatureScaler::default().fit(&FEATURE_NAMES, &matrix).unwrap()
    }

    fn persistence_engine() -> ForecastEngine {
        ForecastEngine::ready(
            Arc::new(PersistenceRegressor::new(TARGET_COLUMN)),
            static_scaler(),
            24,
        )
        .unwrap()
    }

    #[test]
    fn test_static_series_end_to_end() {
        let engine = persistence_engine();
        let rows = vec![row(40.0); 24];

        let points = engine.forecast(&rows, 24).unwrap();

        assert_eq!(points.len(), 24);
        for (i, p) in points.iter().enumerate() {
            assert_eq!(p.hour_offset, i as u32 + 1);
            assert!((p.predicted_pm25_std - 40.0).abs() < 1e-6, "{p:?}");
            assert_eq!(p.predicted_aqi, 100);
        }
    }

    #[test]
    fn test_ready_is_deterministic() {
        let rows: Vec<FeatureRow> = (0..30).map(|i| row(35.0 + f64::from(i % 7))).collect();
        let engine = persistence_engine();
        assert_eq!(engine.forecast(&rows, 24).unwrap(), engine.forecast(&rows, 24).unwrap());
    }

    #[test]
    fn test_ready_rejects_short_history() {
        let engine = persistence_engine();
        let err = engine.forecast(&vec![row(40.0); 23], 24).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientHistory {
                required: 24,
                available: 23
            }
        );
    }

    #[test]
    fn test_ready_propagates_invalid_input() {
        let engine = persistence_engine();
        let mut rows = vec![row(40.0); 24];
        rows[3].temperature = -300.0;
        assert!(matches!(
            engine.forecast(&rows, 24),
            Err(ForecastError::InvalidMeasurement { .. })
        ));
    }

    #[test]
    fn test_degraded_always_answers() {
        let engine = ForecastEngine::from_artifacts(None, 24);
        assert_eq!(engine.mode(), EngineMode::Degraded);
        assert_eq!(engine.degraded_reason(), Some(&DegradedReason::NotFound));

        for rows in [vec![], vec![row(40.0); 3], vec![row(40.0); 48]] {
            let points = engine.forecast(&rows, 24).unwrap();
            assert_eq!(points.len(), 24);
            for (i, p) in points.iter().enumerate() {
                assert_eq!(p.hour_offset, i as u32 + 1);
                assert!(p.predicted_aqi >= 0);
                assert!((p.predicted_aqi - DEGRADED_BASE_AQI).abs() <= DEGRADED_AQI_JITTER);
            }
        }
        assert_eq!(engine.forecast(&[], 6).unwrap().len(), 6);
    }

    #[test]
    fn test_held_covariates_vs_supplied_covariates() {
        // Model: next pm25 tracks the last row's co2 column (scaled).
        #[derive(Debug)]
        struct Co2Echo;
        impl Regressor for Co2Echo {
            fn name(&self) -> &str {
                "co2-echo"
            }
            fn fit(&mut self, _: &[crate::forecast::Window]) -> Result<(), ForecastError> {
                Ok(())
            }
            fn predict(&self, window: &[Vec<f64>]) -> Result<f64, ForecastError> {
                Ok(window[window.len() - 1][5])
            }
            fn is_fitted(&self) -> bool {
                true
            }
            fn input_shape(&self) -> Option<(usize, usize)> {
                None
            }
        }

        let matrix = vec![
            vec![0.0, 0.0, 0.0, 0.0, 1000.0, 0.0],
            vec![1.0, 1.0, 1.0, 1.0, 1020.0, 1.0],
        ];
        let scaler = FeatureScaler::default().fit(&FEATURE_NAMES, &matrix).unwrap();
        let engine = ForecastEngine::ready(Arc::new(Co2Echo), scaler, 2).unwrap();

        let mut base = row(0.5);
        base.co2 = 0.25;
        let history = vec![base; 2];

        let held = engine.forecast(&history, 3).unwrap();
        assert!(held.iter().all(|p| (p.predicted_pm25_std - 0.25).abs() < 1e-12));

        let future: Vec<FeatureRow> = [0.5, 0.75, 1.0]
            .iter()
            .map(|&co2| FeatureRow { co2, ..base })
            .collect();
        let driven = engine.forecast_with_covariates(&history, &future, 3).unwrap();
        let pm25: Vec<f64> = driven.iter().map(|p| p.predicted_pm25_std).collect();
        assert!((pm25[0] - 0.25).abs() < 1e-12);
        assert!((pm25[1] - 0.5).abs() < 1e-12);
        assert!((pm25[2] - 0.75).abs() < 1e-12);

        assert_eq!(
            engine.forecast_with_covariates(&history, &future[..2], 3),
            Err(ForecastError::InsufficientCovariates {
                required: 3,
                available: 2
            })
        );
    }

    #[test]
    fn test_schema_mismatch_degrades() {
        let matrix = vec![vec![0.0, 1.0], vec![1.0, 2.0]];
        let scaler = FeatureScaler::default().fit(&["a", "b"], &matrix).unwrap();
        assert!(matches!(
            ForecastEngine::ready(Arc::new(PersistenceRegressor::new(0)), scaler.clone(), 24),
            Err(ForecastError::SchemaMismatch(_))
        ));

        let pair = ArtifactPair {
            model: Arc::new(TrainedModel::Persistence(PersistenceRegressor::new(0))),
            scaler,
            metadata: metadata(24),
        };
        let engine = ForecastEngine::from_artifacts(Some(pair), 24);
        assert_eq!(engine.mode(), EngineMode::Degraded);
        assert!(matches!(engine.degraded_reason(), Some(DegradedReason::Inconsistent(_))));
    }

    #[test]
    fn test_wrong_target_column_degrades() {
        assert!(matches!(
            ForecastEngine::ready(Arc::new(PersistenceRegressor::new(3)), static_scaler(), 24),
            Err(ForecastError::SchemaMismatch(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        store
            .save(&ArtifactPair {
                model: Arc::new(TrainedModel::Persistence(PersistenceRegressor::new(3))),
                scaler: static_scaler(),
                metadata: metadata(24),
            })
            .unwrap();
        let engine = ForecastEngine::load(&store, 24);
        assert_eq!(engine.mode(), EngineMode::Degraded);
        assert!(matches!(engine.degraded_reason(), Some(DegradedReason::Inconsistent(_))));
    }

    #[test]
    fn test_window_length_mismatch_degrades() {
        let pair = ArtifactPair {
            model: Arc::new(TrainedModel::Persistence(PersistenceRegressor::new(0))),
            scaler: static_scaler(),
            metadata: metadata(12),
        };
        let engine = ForecastEngine::from_artifacts(Some(pair), 24);
        assert_eq!(engine.mode(), EngineMode::Degraded);
    }

    #[test]
    fn test_trained_reservoir_loaded_from_disk() {
        let scaler = static_scaler();
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|i| {
                let wave = (f64::from(i) * std::f64::consts::TAU / 24.0).sin();
                vec![40.0 + wave * 1e-3, 70.0, 25.0, 80.0, 1013.25, 600.0]
            })
            .collect();
        let windows = window(&scaler.apply_matrix(&rows).unwrap(), TARGET_COLUMN, 24).unwrap();
        let mut model = ReservoirRegressor::new(ReservoirConfig {
            units: 8,
            ..ReservoirConfig::default()
        });
        model.fit(&windows).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        store
            .save(&ArtifactPair {
                model: Arc::new(TrainedModel::Reservoir(model)),
                scaler,
                metadata: metadata(24),
            })
            .unwrap();

        let engine = ForecastEngine::load(&store, 24);
        assert_eq!(engine.mode(), EngineMode::Ready);
        assert_eq!(engine.model_name(), Some("cfc-reservoir"));
        assert_eq!(engine.metadata().map(|m| m.time_step), Some(24));

        let history = vec![row(40.0); 24];
        let first = engine.forecast(&history, 24).unwrap();
        assert_eq!(first, engine.forecast(&history, 24).unwrap());
        assert!(first.iter().all(|p| p.predicted_pm25_std.is_finite()));
    }

    #[test]
    fn test_reservoir_with_tampered_units_degrades() {
        let scaler = static_scaler();
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|i| {
                let wave = (f64::from(i) * std::f64::consts::TAU / 24.0).sin();
                vec![40.0 + wave * 1e-3, 70.0, 25.0, 80.0, 1013.25, 600.0]
            })
            .collect();
        let windows = window(&scaler.apply_matrix(&rows).unwrap(), TARGET_COLUMN, 24).unwrap();
        let mut model = ReservoirRegressor::new(ReservoirConfig {
            units: 4,
            ..ReservoirConfig::default()
        });
        model.fit(&windows).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        store
            .save(&ArtifactPair {
                model: Arc::new(TrainedModel::Reservoir(model)),
                scaler,
                metadata: metadata(24),
            })
            .unwrap();

        let model_path = dir.path().join("model.json");
        let json = std::fs::read_to_string(&model_path).unwrap();
        assert!(json.contains("\"units\": 4"));
        std::fs::write(&model_path, json.replace("\"units\": 4", "\"units\": 8")).unwrap();

        assert!(matches!(store.load(), Err(LoadError::Corrupt { .. })));
        let engine = ForecastEngine::load(&store, 24);
        assert_eq!(engine.mode(), EngineMode::Degraded);
        assert!(matches!(engine.degraded_reason(), Some(DegradedReason::LoadFailed(_))));

        let history = vec![row(40.0); 24];
        let points = engine.forecast(&history, 24).unwrap();
        assert_eq!(points.len(), 24);
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ForecastEngine::load(&FileArtifactStore::new(dir.path().join("none")), 24);
        assert_eq!(engine.degraded_reason(), Some(&DegradedReason::NotFound));

        std::fs::write(dir.path().join("model.json"), "{}").unwrap();
        std::fs::write(dir.path().join("scaler.json"), "{}").unwrap();
        let engine = ForecastEngine::load(&FileArtifactStore::new(dir.path()), 24);
        assert!(matches!(engine.degraded_reason(), Some(DegradedReason::LoadFailed(_))));
        assert_eq!(engine.forecast(&[], 24).unwrap().len(), 24);
    }

    fn metadata(time_step: usize) -> ArtifactMetadata {
        ArtifactMetadata {
            model_name: "test".to_string(),
            trained_at: Utc::now(),
            time_step,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            train_windows: 1,
            test_windows: 0,
            metrics: None,
        }
    }
}
