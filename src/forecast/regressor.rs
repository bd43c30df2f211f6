//! Trainable regressor capability.
//!
//! The engine only needs "one scaled target value per step" from a model:
//! `fit` consumes training windows in temporal order, `predict` maps the most
//! recent `time_step × width` scaled rows to the next scaled target value.

use serde::{Deserialize, Serialize};

use super::{ForecastError, Window};

/// A model that can be trained on windows and queried one step ahead.
///
/// Implementations must be deterministic for identical state and input.
pub trait Regressor: Send + Sync + std::fmt::Debug {
    /// Short model name for logs and metadata.
    fn name(&self) -> &str;

    /// Train on `windows`, replacing any previous state.
    fn fit(&mut self, windows: &[Window]) -> Result<(), ForecastError>;

    /// Predict the next scaled target value from one input window.
    fn predict(&self, window: &[Vec<f64>]) -> Result<f64, ForecastError>;

    /// Whether `predict` can be called.
    fn is_fitted(&self) -> bool;

    /// `(time_step, width)` the model was trained with, if it is shape-bound.
    fn input_shape(&self) -> Option<(usize, usize)>;

    /// Feature column the model reads its prediction from, if it is column-bound.
    fn target_column(&self) -> Option<usize> {
        None
    }

    /// Check that deserialized state is internally consistent, so `predict`
    /// cannot index out of bounds.
    fn validate(&self) -> Result<(), ForecastError> {
        Ok(())
    }
}

/// Check `window` against a `(time_step, width)` shape.
pub(crate) fn check_shape(
    window: &[Vec<f64>],
    time_step: usize,
    width: usize,
) -> Result<(), ForecastError> {
    if window.len() != time_step {
        return Err(ForecastError::SchemaMismatch(format!(
            "window has {} steps, model expects {time_step}",
            window.len()
        )));
    }
    if let Some(row) = window.iter().find(|r| r.len() != width) {
        return Err(ForecastError::SchemaMismatch(format!(
            "window row has {} features, model expects {width}",
            row.len()
        )));
    }
    Ok(())
}

/// No-change baseline: predicts the target column of the last input row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceRegressor {
    target_column: usize,
    #[serde(default)]
    shape: Option<(usize, usize)>,
}

impl PersistenceRegressor {
    pub fn new(target_column: usize) -> Self {
        Self {
            target_column,
            shape: None,
        }
    }
}

impl Regressor for PersistenceRegressor {
    fn name(&self) -> &str {
        "persistence"
    }

    fn fit(&mut self, windows: &[Window]) -> Result<(), ForecastError> {
        let first = windows.first().ok_or(ForecastError::InsufficientData {
            required: 1,
            available: 0,
        })?;
        let time_step = first.inputs.len();
        let width = first.inputs.first().map_or(0, Vec::len);
        if self.target_column >= width {
            return Err(ForecastError::SchemaMismatch(format!(
                "target column {} out of range for {width} features",
                self.target_column
            )));
        }
        for w in windows {
            check_shape(&w.inputs, time_step, width)?;
        }
        self.shape = Some((time_step, width));
        Ok(())
    }

    fn predict(&self, window: &[Vec<f64>]) -> Result<f64, ForecastError> {
        if let Some((time_step, width)) = self.shape {
            check_shape(window, time_step, width)?;
        }
        window
            .last()
            .and_then(|row| row.get(self.target_column))
            .copied()
            .ok_or_else(|| {
                ForecastError::SchemaMismatch(format!(
                    "window has no value for target column {}",
                    self.target_column
                ))
            })
    }

    fn is_fitted(&self) -> bool {
        true
    }

    fn input_shape(&self) -> Option<(usize, usize)> {
        self.shape
    }

    fn target_column(&self) -> Option<usize> {
        Some(self.target_column)
    }

    fn validate(&self) -> Result<(), ForecastError> {
        match self.shape {
            Some((0, _)) => Err(ForecastError::SchemaMismatch(
                "persistence shape has zero steps".to_string(),
            )),
            Some((_, width)) if self.target_column >= width => {
                Err(ForecastError::SchemaMismatch(format!(
                    "target column {} out of range for {width} features",
                    self.target_column
                )))
            }
            _ => Ok(()),
        }
    }
}
