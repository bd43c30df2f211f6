//! Standard-conditions correction for particulate concentrations.
//!
//! A concentration measured at ambient pressure `P` (hPa) and temperature
//! `T` (°C) is referred to 1013.25 hPa / 25 °C:
//!
//! ```text
//! C_std = C * (P / P_STD) * (T_STD / (T + 273.15))
//! ```
//!
//! Training and serving both go through this module, so the Kelvin offset and
//! reference constants are defined exactly once.

use crate::types::{FeatureRow, StandardizedFeatureRow};

use super::ForecastError;

/// Reference pressure (hPa).
pub const P_STD_HPA: f64 = 1013.25;

/// Reference temperature (K), 25 °C.
pub const T_STD_K: f64 = 298.15;

/// Celsius to Kelvin offset.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Convert °C to K, rejecting temperatures at or below absolute zero.
pub fn to_kelvin(celsius: f64) -> Result<f64, ForecastError> {
    let kelvin = finite("temperature", celsius)? + KELVIN_OFFSET;
    if kelvin <= 0.0 {
        return Err(ForecastError::InvalidMeasurement {
            field: "temperature".to_string(),
            value: celsius,
            reason: "at or below absolute zero",
        });
    }
    Ok(kelvin)
}

/// Standardize one concentration to reference pressure and temperature.
pub fn standardize(
    concentration: f64,
    pressure_hpa: f64,
    temperature_c: f64,
) -> Result<f64, ForecastError> {
    let concentration = finite("concentration", concentration)?;
    let pressure = finite("pressure", pressure_hpa)?;
    if pressure <= 0.0 {
        return Err(ForecastError::InvalidMeasurement {
            field: "pressure".to_string(),
            value: pressure,
            reason: "pressure must be positive",
        });
    }
    let kelvin = to_kelvin(temperature_c)?;

    let value = concentration * (pressure / P_STD_HPA) * (T_STD_K / kelvin);
    finite("standardized concentration", value)
}

/// Add `pm25_std` / `pm10_std` to a raw row.
///
/// Every raw field must be finite; a NaN covariate would otherwise survive
/// into the scaled window.
pub fn standardize_row(row: &FeatureRow) -> Result<StandardizedFeatureRow, ForecastError> {
    for (name, value) in row.named_fields() {
        finite(name, value)?;
    }

    Ok(StandardizedFeatureRow {
        raw: *row,
        pm25_std: standardize(row.pm25, row.pressure, row.temperature)?,
        pm10_std: standardize(row.pm10, row.pressure, row.temperature)?,
    })
}

/// Standardize a sequence of rows, failing on the first invalid one.
pub fn standardize_rows(rows: &[FeatureRow]) -> Result<Vec<StandardizedFeatureRow>, ForecastError> {
    rows.iter().map(standardize_row).collect()
}

fn finite(field: &str, value: f64) -> Result<f64, ForecastError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ForecastError::InvalidMeasurement {
            field: field.to_string(),
            value,
            reason: "not a finite number",
        })
    }
}
