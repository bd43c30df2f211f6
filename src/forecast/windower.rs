//! Sliding-window construction for supervised sequence learning.
//!
//! Window `i` holds rows `[i, i + time_step)` as input and the target
//! column of row `i + time_step` as label. Windows keep the temporal order of
//! the input; nothing here shuffles, because a shuffled time series leaks
//! future values across the train/test split.

use super::ForecastError;

/// Hours of history per model input.
pub const DEFAULT_TIME_STEP: usize = 24;

/// One supervised training example.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// `time_step` consecutive scaled rows.
    pub inputs: Vec<Vec<f64>>,
    /// Scaled target value at the step after the last input row.
    pub target: f64,
}

/// Slice `matrix` into overlapping windows of `time_step` rows.
///
/// Yields exactly `matrix.len() - time_step` windows.
pub fn window(
    matrix: &[Vec<f64>],
    target_column: usize,
    time_step: usize,
) -> Result<Vec<Window>, ForecastError> {
    if time_step == 0 {
        return Err(ForecastError::SchemaMismatch(
            "time_step must be at least 1".to_string(),
        ));
    }
    if matrix.len() <= time_step {
        return Err(ForecastError::InsufficientData {
            required: time_step + 1,
            available: matrix.len(),
        });
    }

    let width = matrix[0].len();
    if let Some((i, row)) = matrix.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(ForecastError::SchemaMismatch(format!(
            "row {i} has {} values, expected {width}",
            row.len()
        )));
    }
    if target_column >= width {
        return Err(ForecastError::SchemaMismatch(format!(
            "target column {target_column} out of range for {width} features"
        )));
    }

    Ok((0..matrix.len() - time_step)
        .map(|i| Window {
            inputs: matrix[i..i + time_step].to_vec(),
            target: matrix[i + time_step][target_column],
        })
        .collect())
}

/// Split windows chronologically: the first `1 - test_fraction` train, the
/// rest test. At least one window always lands in the training half.
pub fn split_chronological(windows: Vec<Window>, test_fraction: f64) -> (Vec<Window>, Vec<Window>) {
    let fraction = test_fraction.clamp(0.0, 1.0);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let train_len = ((windows.len() as f64) * (1.0 - fraction)).floor() as usize;
    let train_len = train_len.clamp(1.min(windows.len()), windows.len());

    let mut train = windows;
    let test = train.split_off(train_len);
    (train, test)
}
