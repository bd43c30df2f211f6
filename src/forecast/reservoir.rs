//! Closed-form continuous-time (CfC) reservoir regressor.
//!
//! A gated continuous-time recurrent cell with fixed, seeded random weights
//! runs over each input window:
//!
//! ```text
//!   tau   = softplus(W_tau · [x; h] + b_tau)
//!   f     = sigmoid(-(dt * tau) * (W_f · [x; h] + b_f))
//!   g     = tanh(W_g · [x; h] + b_g)
//!   h_new = f * g + (1 - f) * h
//! ```
//!
//! The final hidden state, the last input row and a bias term form the
//! design row for a linear readout, solved in closed form with ridge
//! regression: `(XᵀX + λI) w = Xᵀy`. Only the readout is trained, so fitting
//! is a single pass over the windows plus one linear solve.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::regressor::{check_shape, Regressor};
use super::{ForecastError, Window};

/// Pivot magnitude below which the readout system is treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// Reservoir hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservoirConfig {
    /// Hidden units in the recurrent cell.
    pub units: usize,
    /// Seed for the fixed cell weights.
    pub seed: u64,
    /// Ridge penalty on the readout (the bias term is not penalized).
    pub ridge: f64,
    /// Scale of input-to-hidden weights.
    pub input_scale: f64,
    /// Scale of hidden-to-hidden weights. Values below 1 keep the state contractive.
    pub recurrent_scale: f64,
    /// Time step between rows, in hours.
    pub dt: f64,
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self {
            units: 32,
            seed: 42,
            ridge: 1e-3,
            input_scale: 1.0,
            recurrent_scale: 0.5,
            dt: 1.0,
        }
    }
}

/// Weights of one gate over the concatenated `[x; h]` input.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GateWeights {
    /// `[units x width]`, row-major.
    w_in: Vec<f64>,
    /// `[units x units]`, row-major.
    w_rec: Vec<f64>,
    bias: Vec<f64>,
}

impl GateWeights {
    fn init(units: usize, width: usize, bias: f64, config: &ReservoirConfig, rng: &mut StdRng) -> Self {
        // Xavier-style uniform init, scaled per block.
        let uniform = |n: usize, fan_in: usize, scale: f64, rng: &mut StdRng| -> Vec<f64> {
            #[allow(clippy::cast_precision_loss)]
            let bound = scale * (2.0 / (fan_in + units).max(1) as f64).sqrt();
            (0..n).map(|_| rng.gen::<f64>() * 2.0 * bound - bound).collect()
        };
        Self {
            w_in: uniform(units * width, width, config.input_scale, rng),
            w_rec: uniform(units * units, units, config.recurrent_scale, rng),
            bias: vec![bias; units],
        }
    }

    fn check(&self, gate: &str, units: usize, width: usize) -> Result<(), ForecastError> {
        let expected = [
            ("w_in", self.w_in.len(), units * width),
            ("w_rec", self.w_rec.len(), units * units),
            ("bias", self.bias.len(), units),
        ];
        for (name, len, want) in expected {
            if len != want {
                return Err(ForecastError::Model(format!(
                    "{gate} gate {name} has {len} weights, expected {want}"
                )));
            }
        }
        Ok(())
    }

    fn pre_activation(&self, neuron: usize, x: &[f64], h: &[f64]) -> f64 {
        let width = x.len();
        let units = h.len();
        let w_in = &self.w_in[neuron * width..(neuron + 1) * width];
        let w_rec = &self.w_rec[neuron * units..(neuron + 1) * units];
        let input: f64 = w_in.iter().zip(x).map(|(w, v)| w * v).sum();
        let recurrent: f64 = w_rec.iter().zip(h).map(|(w, v)| w * v).sum();
        input + recurrent + self.bias[neuron]
    }
}

/// Fixed recurrent cell weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CellWeights {
    tau: GateWeights,
    f: GateWeights,
    g: GateWeights,
}

impl CellWeights {
    fn init(width: usize, config: &ReservoirConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let units = config.units;
        Self {
            // Bias toward moderate time constants.
            tau: GateWeights::init(units, width, 0.5, config, &mut rng),
            f: GateWeights::init(units, width, 0.0, config, &mut rng),
            g: GateWeights::init(units, width, 0.0, config, &mut rng),
        }
    }

    fn step(&self, x: &[f64], h: &[f64], dt: f64) -> Vec<f64> {
        (0..h.len())
            .map(|i| {
                let tau = softplus(self.tau.pre_activation(i, x, h));
                let f = sigmoid(-(dt * tau) * self.f.pre_activation(i, x, h));
                let g = self.g.pre_activation(i, x, h).tanh();
                f * g + (1.0 - f) * h[i]
            })
            .collect()
    }

    /// Final hidden state, last input row and a trailing bias of 1.
    fn design_row(&self, window: &[Vec<f64>], units: usize, dt: f64) -> Vec<f64> {
        let mut h = vec![0.0; units];
        for x in window {
            h = self.step(x, &h, dt);
        }
        let mut row = h;
        if let Some(last) = window.last() {
            row.extend_from_slice(last);
        }
        row.push(1.0);
        row
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softplus(x: f64) -> f64 {
    if x > 20.0 {
        x
    } else {
        x.exp().ln_1p()
    }
}

/// Recurrent reservoir with a ridge-regression readout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservoirRegressor {
    config: ReservoirConfig,
    shape: Option<(usize, usize)>,
    cell: Option<CellWeights>,
    readout: Vec<f64>,
}

impl ReservoirRegressor {
    pub fn new(config: ReservoirConfig) -> Self {
        Self {
            config,
            shape: None,
            cell: None,
            readout: Vec::new(),
        }
    }

    pub fn config(&self) -> &ReservoirConfig {
        &self.config
    }
}

impl Regressor for ReservoirRegressor {
    fn name(&self) -> &str {
        "cfc-reservoir"
    }

    fn fit(&mut self, windows: &[Window]) -> Result<(), ForecastError> {
        let first = windows.first().ok_or(ForecastError::InsufficientData {
            required: 1,
            available: 0,
        })?;
        if self.config.units == 0 {
            return Err(ForecastError::Model("reservoir needs at least one unit".to_string()));
        }
        let time_step = first.inputs.len();
        let width = first.inputs.first().map_or(0, Vec::len);
        for w in windows {
            check_shape(&w.inputs, time_step, width)?;
            if !w.target.is_finite() {
                return Err(ForecastError::InvalidMeasurement {
                    field: "target".to_string(),
                    value: w.target,
                    reason: "not a finite number",
                });
            }
        }

        let cell = CellWeights::init(width, &self.config);
        let units = self.config.units;
        let dt = self.config.dt;
        let design: Vec<Vec<f64>> = windows
            .par_iter()
            .map(|w| cell.design_row(&w.inputs, units, dt))
            .collect();

        let dim = units + width + 1;
        let mut gram = vec![0.0; dim * dim];
        let mut rhs = vec![0.0; dim];
        for (row, w) in design.iter().zip(windows) {
            for i in 0..dim {
                rhs[i] += row[i] * w.target;
                for j in i..dim {
                    gram[i * dim + j] += row[i] * row[j];
                }
            }
        }
        for i in 0..dim {
            for j in 0..i {
                gram[i * dim + j] = gram[j * dim + i];
            }
        }
        for i in 0..dim - 1 {
            gram[i * dim + i] += self.config.ridge;
        }

        let readout = solve_cholesky(&gram, &rhs, dim)
            .or_else(|| solve_gaussian(gram, rhs, dim))
            .ok_or_else(|| ForecastError::Model("readout system is singular".to_string()))?;

        debug!(
            windows = windows.len(),
            units,
            width,
            time_step,
            "Fitted reservoir readout"
        );

        self.shape = Some((time_step, width));
        self.cell = Some(cell);
        self.readout = readout;
        Ok(())
    }

    fn predict(&self, window: &[Vec<f64>]) -> Result<f64, ForecastError> {
        let (cell, (time_step, width)) = match (&self.cell, self.shape) {
            (Some(cell), Some(shape)) => (cell, shape),
            _ => return Err(ForecastError::Model("reservoir has not been fitted".to_string())),
        };
        check_shape(window, time_step, width)?;

        let row = cell.design_row(window, self.config.units, self.config.dt);
        let value: f64 = row.iter().zip(&self.readout).map(|(a, b)| a * b).sum();
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ForecastError::Model(format!("non-finite prediction {value}")))
        }
    }

    fn is_fitted(&self) -> bool {
        self.cell.is_some() && !self.readout.is_empty()
    }

    fn input_shape(&self) -> Option<(usize, usize)> {
        self.shape
    }

    fn validate(&self) -> Result<(), ForecastError> {
        let (Some(cell), Some((time_step, width))) = (&self.cell, self.shape) else {
            return Err(ForecastError::Model("reservoir has not been fitted".to_string()));
        };
        let units = self.config.units;
        if units == 0 || time_step == 0 || width == 0 {
            return Err(ForecastError::Model(format!(
                "reservoir dimensions {units} units, {time_step}x{width} window"
            )));
        }
        cell.tau.check("tau", units, width)?;
        cell.f.check("f", units, width)?;
        cell.g.check("g", units, width)?;
        if self.readout.len() != units + width + 1 {
            return Err(ForecastError::Model(format!(
                "readout has {} weights, expected {}",
                self.readout.len(),
                units + width + 1
            )));
        }
        Ok(())
    }
}

/// Solve a symmetric positive-definite system via Cholesky decomposition.
fn solve_cholesky(a: &[f64], b: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i * n + k] * l[j * n + k]).sum();
            if i == j {
                let d = a[i * n + i] - sum;
                if d <= SINGULAR_EPS {
                    return None;
                }
                l[i * n + i] = d.sqrt();
            } else {
                l[i * n + j] = (a[i * n + j] - sum) / l[j * n + j];
            }
        }
    }

    // L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|k| l[i * n + k] * y[k]).sum();
        y[i] = (b[i] - sum) / l[i * n + i];
    }
    // Lᵀ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|k| l[k * n + i] * x[k]).sum();
        x[i] = (y[i] - sum) / l[i * n + i];
    }
    Some(x)
}

/// Gaussian elimination with partial pivoting.
fn solve_gaussian(mut a: Vec<f64>, mut b: Vec<f64>, n: usize) -> Option<Vec<f64>> {
    for col in 0..n {
        let pivot = (col..n).max_by(|&r, &s| {
            a[r * n + col]
                .abs()
                .partial_cmp(&a[s * n + col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot * n + col].abs() < SINGULAR_EPS {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap(pivot * n + k, col * n + k);
            }
            b.swap(pivot, col);
        }
        for row in col + 1..n {
            let factor = a[row * n + col] / a[col * n + col];
            for k in col..n {
                a[row * n + k] -= factor * a[col * n + k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|k| a[i * n + k] * x[k]).sum();
        x[i] = (b[i] - sum) / a[i * n + i];
    }
    Some(x)
}
