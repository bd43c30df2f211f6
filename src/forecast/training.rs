//! Offline training: fit the scaler and regressor, evaluate on a
//! chronological hold-out, package the artifact pair.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::types::{ArtifactMetadata, FeatureRow, ModelMetrics, FEATURE_NAMES, TARGET_COLUMN};

use super::normalizer::standardize_rows;
use super::windower::split_chronological;
use super::{
    window, ArtifactPair, DegeneratePolicy, FeatureScaler, FittedScaler, ForecastError,
    PersistenceRegressor, Regressor, ReservoirConfig, ReservoirRegressor, TrainedModel, Window,
    DEFAULT_TIME_STEP,
};

/// Which regressor `train` fits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Reservoir,
    Persistence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub time_step: usize,
    /// Fraction of windows, taken from the end, held out for evaluation.
    pub test_fraction: f64,
    pub degenerate_policy: DegeneratePolicy,
    pub model: ModelKind,
    pub reservoir: ReservoirConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            time_step: DEFAULT_TIME_STEP,
            test_fraction: 0.2,
            degenerate_policy: DegeneratePolicy::default(),
            model: ModelKind::default(),
            reservoir: ReservoirConfig::default(),
        }
    }
}

/// Fit a scaler and regressor on chronologically ordered `rows`.
///
/// The scaler sees the full history; the regressor only the training split.
pub fn train(rows: &[FeatureRow], config: &TrainingConfig) -> Result<ArtifactPair, ForecastError> {
    let standardized = standardize_rows(rows)?;
    let matrix: Vec<Vec<f64>> = standardized.iter().map(|r| r.features().to_vec()).collect();

    let scaler = FeatureScaler::new(config.degenerate_policy).fit(&FEATURE_NAMES, &matrix)?;
    let scaled = scaler.apply_matrix(&matrix)?;
    let windows = window(&scaled, TARGET_COLUMN, config.time_step)?;
    let (train_set, test_set) = split_chronological(windows, config.test_fraction);

    let mut model = match config.model {
        ModelKind::Reservoir => TrainedModel::Reservoir(ReservoirRegressor::new(config.reservoir.clone())),
        ModelKind::Persistence => TrainedModel::Persistence(PersistenceRegressor::new(TARGET_COLUMN)),
    };
    model.fit(&train_set)?;

    let metrics = evaluate(&model, &scaler, &test_set)?;
    if let Some(m) = metrics {
        let baseline = evaluate(&PersistenceRegressor::new(TARGET_COLUMN), &scaler, &test_set)?;
        info!(
            model = model.name(),
            rmse = m.rmse,
            mae = m.mae,
            r2 = m.r2,
            baseline_rmse = baseline.map(|b| b.rmse),
            "Hold-out evaluation"
        );
    }

    let metadata = ArtifactMetadata {
        model_name: model.name().to_string(),
        trained_at: Utc::now(),
        time_step: config.time_step,
        feature_names: scaler.feature_names().to_vec(),
        train_windows: train_set.len(),
        test_windows: test_set.len(),
        metrics,
    };

    Ok(ArtifactPair {
        model: Arc::new(model),
        scaler,
        metadata,
    })
}

/// RMSE, MAE and R² on `windows`, in standardized PM2.5 units. `None` when
/// there is nothing to evaluate.
pub fn evaluate(
    model: &dyn Regressor,
    scaler: &FittedScaler,
    windows: &[Window],
) -> Result<Option<ModelMetrics>, ForecastError> {
    if windows.is_empty() {
        return Ok(None);
    }

    let mut pairs = Vec::with_capacity(windows.len());
    for w in windows {
        let predicted = scaler.invert(model.predict(&w.inputs)?, TARGET_COLUMN)?;
        let actual = scaler.invert(w.target, TARGET_COLUMN)?;
        pairs.push((predicted, actual));
    }

    #[allow(clippy::cast_precision_loss)]
    let n = pairs.len() as f64;
    let mean = pairs.iter().map(|(_, a)| a).sum::<f64>() / n;
    let ss_res: f64 = pairs.iter().map(|(p, a)| (p - a).powi(2)).sum();
    let ss_tot: f64 = pairs.iter().map(|(_, a)| (a - mean).powi(2)).sum();
    let mae = pairs.iter().map(|(p, a)| (p - a).abs()).sum::<f64>() / n;

    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    Ok(Some(ModelMetrics {
        rmse: (ss_res / n).sqrt(),
        mae,
        r2,
    }))
}
