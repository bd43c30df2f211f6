//! Per-feature min-max scaling.
//!
//! `fit` records each column's observed `(min, max)`; `apply` maps values to
//! `(v - min) / (max - min)` and `invert` maps them back. Values outside the
//! fitted range are deliberately not clamped: live readings that exceed the
//! historical bounds extrapolate past `[0, 1]`.

use serde::{Deserialize, Serialize};

use super::ForecastError;

/// How `fit` treats a column whose min equals its max.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Fail with [`ForecastError::DegenerateColumn`].
    #[default]
    Strict,
    /// Use a range of 1 for the column, so values map to `v - min`.
    UnitRange,
}

/// Observed bounds of one feature column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    /// Divisor used by `apply`; 1 for a degenerate column admitted under
    /// [`DegeneratePolicy::UnitRange`].
    fn span(&self) -> f64 {
        let span = self.max - self.min;
        if span > 0.0 {
            span
        } else {
            1.0
        }
    }
}

/// Builds a [`FittedScaler`] under a chosen degenerate-column policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureScaler {
    policy: DegeneratePolicy,
}

impl FeatureScaler {
    pub fn new(policy: DegeneratePolicy) -> Self {
        Self { policy }
    }

    /// Fit per-column bounds over `matrix`, whose rows follow `feature_names`.
    pub fn fit<S: AsRef<str>>(
        &self,
        feature_names: &[S],
        matrix: &[Vec<f64>],
    ) -> Result<FittedScaler, ForecastError> {
        let width = feature_names.len();
        if matrix.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let mut ranges = vec![
            ColumnRange {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            };
            width
        ];

        for (i, row) in matrix.iter().enumerate() {
            if row.len() != width {
                return Err(ForecastError::SchemaMismatch(format!(
                    "row {i} has {} values, schema has {width} features",
                    row.len()
                )));
            }
            for (col, &value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(ForecastError::InvalidMeasurement {
                        field: feature_names[col].as_ref().to_string(),
                        value,
                        reason: "not a finite number",
                    });
                }
                let range = &mut ranges[col];
                range.min = range.min.min(value);
                range.max = range.max.max(value);
            }
        }

        if self.policy == DegeneratePolicy::Strict {
            for (name, range) in feature_names.iter().zip(&ranges) {
                if range.max <= range.min {
                    return Err(ForecastError::DegenerateColumn {
                        column: name.as_ref().to_string(),
                        value: range.min,
                    });
                }
            }
        }

        Ok(FittedScaler {
            feature_names: feature_names.iter().map(|n| n.as_ref().to_string()).collect(),
            ranges,
            policy: self.policy,
        })
    }
}

/// Immutable min-max transform produced by [`FeatureScaler::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    feature_names: Vec<String>,
    ranges: Vec<ColumnRange>,
    #[serde(default)]
    policy: DegeneratePolicy,
}

impl FittedScaler {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn width(&self) -> usize {
        self.ranges.len()
    }

    pub fn range(&self, column: usize) -> Option<ColumnRange> {
        self.ranges.get(column).copied()
    }

    /// Whether this scaler was fit on exactly `names`, in order.
    pub fn matches_schema<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.feature_names.len() == names.len()
            && self
                .feature_names
                .iter()
                .zip(names)
                .all(|(a, b)| a == b.as_ref())
    }

    /// Check internal consistency of a deserialized scaler.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.feature_names.len() != self.ranges.len() {
            return Err(ForecastError::SchemaMismatch(format!(
                "{} feature names but {} column ranges",
                self.feature_names.len(),
                self.ranges.len()
            )));
        }
        for (name, range) in self.feature_names.iter().zip(&self.ranges) {
            if !range.min.is_finite() || !range.max.is_finite() {
                return Err(ForecastError::InvalidMeasurement {
                    field: name.clone(),
                    value: if range.min.is_finite() { range.max } else { range.min },
                    reason: "scaler bound is not finite",
                });
            }
            let degenerate = range.max <= range.min;
            if degenerate && self.policy == DegeneratePolicy::Strict {
                return Err(ForecastError::DegenerateColumn {
                    column: name.clone(),
                    value: range.min,
                });
            }
        }
        Ok(())
    }

    /// Scale one row.
    pub fn apply(&self, row: &[f64]) -> Result<Vec<f64>, ForecastError> {
        self.check_width(row.len())?;
        Ok(row
            .iter()
            .zip(&self.ranges)
            .map(|(&v, r)| (v - r.min) / r.span())
            .collect())
    }

    /// Scale every row of a matrix.
    pub fn apply_matrix(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ForecastError> {
        matrix.iter().map(|row| self.apply(row)).collect()
    }

    /// Map a scaled value of `column` back to original units.
    pub fn invert(&self, scaled: f64, column: usize) -> Result<f64, ForecastError> {
        let range = self.ranges.get(column).ok_or_else(|| {
            ForecastError::SchemaMismatch(format!(
                "column {column} out of range for {}-feature scaler",
                self.width()
            ))
        })?;
        Ok(scaled * range.span() + range.min)
    }

    fn check_width(&self, found: usize) -> Result<(), ForecastError> {
        if found == self.width() {
            Ok(())
        } else {
            Err(ForecastError::SchemaMismatch(format!(
                "row has {found} values, scaler was fit on {} features",
                self.width()
            )))
        }
    }
}
