//! Shared data structures for the air-quality forecasting backend
//!
//! - `FeatureRow` / `StandardizedFeatureRow`: hourly sensor measurements
//! - `ForecastPoint`: one hour of the 24-hour AQI forecast
//! - `HistoryRecord` / `CurrentReading`: payloads of the monitoring API

mod air;
mod forecast;
mod record;

pub use air::*;
pub use forecast::*;
pub use record::*;
