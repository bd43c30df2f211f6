//! Seeded synthetic station history.
//!
//! Hourly rows with an annual and a daily cycle plus Gaussian noise, clipped
//! to plausible urban ranges. Used to bootstrap training when no real
//! station export is available.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal, Uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::types::FeatureRow;

const HOURS_PER_YEAR: f64 = 365.0 * 24.0;
const HOURS_PER_DAY: f64 = 24.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub start: DateTime<Utc>,
    pub hours: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            start: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            // 2024-01-01 00:00 through 2024-12-31 22:00
            hours: 8759,
            seed: 42,
        }
    }
}

/// Generate `config.hours` consecutive hourly rows.
pub fn generate(config: &SyntheticConfig) -> Vec<FeatureRow> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let coarse_ratio = Uniform::new(1.5, 2.5);

    let mut rows = Vec::with_capacity(config.hours);
    for i in 0..config.hours {
        #[allow(clippy::cast_precision_loss)]
        let t = i as f64;
        let annual = (t * TAU / HOURS_PER_YEAR).sin();
        let daily = (t * TAU / HOURS_PER_DAY).sin();

        let pm25 = (35.0 + 20.0 * annual + 10.0 * daily + noise(&mut rng, 5.0)).clamp(15.0, 80.0);
        let pm10 = (pm25 * coarse_ratio.sample(&mut rng)).clamp(25.0, 120.0);
        let co2 = (500.0 + 150.0 * daily + noise(&mut rng, 30.0))
            .clamp(450.0, 800.0)
            .trunc();
        let temperature = 22.0 + 5.0 * annual + noise(&mut rng, 2.0);
        let humidity = 80.0 + 15.0 * annual + noise(&mut rng, 5.0);
        let pressure = 1008.0 + noise(&mut rng, 5.0);

        rows.push(FeatureRow {
            timestamp: Some(config.start + Duration::hours(i64::try_from(i).unwrap_or(i64::MAX))),
            pm25: round_to(pm25, 2),
            pm10: round_to(pm10, 2),
            temperature: round_to(temperature, 1),
            humidity: humidity.round(),
            pressure: round_to(pressure, 2),
            co2,
        });
    }

    tracing::debug!(hours = rows.len(), seed = config.seed, "Generated synthetic station history");
    rows
}

/// Zero-mean Gaussian sample.
fn noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    std_dev * rng.sample::<f64, _>(StandardNormal)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
