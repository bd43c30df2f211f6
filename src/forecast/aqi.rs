//! AQI derivation and dashboard categories.
//!
//! The forecast uses a linear proxy, `AQI = round(PM2.5_std × 2.5)`, not the
//! EPA piecewise breakpoint table. Downstream consumers depend on this exact
//! scaling, so it is kept as a labeled approximation.

use serde::{Deserialize, Serialize};

/// AQI units per µg/m³ of standardized PM2.5 in the linear proxy.
pub const AQI_PER_PM25: f64 = 2.5;

/// Linear AQI proxy for a PM2.5 concentration. Never negative.
pub fn linear_aqi(pm25: f64) -> i64 {
    if !pm25.is_finite() {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation)]
    let aqi = (pm25 * AQI_PER_PM25).round() as i64;
    aqi.max(0)
}

/// Dashboard severity label for an AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Moderate,
    Unhealthy,
}

impl AqiCategory {
    pub fn from_aqi(aqi: i64) -> Self {
        match aqi {
            i64::MIN..=50 => Self::Good,
            51..=150 => Self::Moderate,
            _ => Self::Unhealthy,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Unhealthy => "Unhealthy",
        }
    }
}

impl std::fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_proxy() {
        assert_eq!(linear_aqi(40.0), 100);
        assert_eq!(linear_aqi(41.0), 103); // 102.5 rounds away from zero
        assert_eq!(linear_aqi(-4.0), 0);
        assert_eq!(linear_aqi(f64::NAN), 0);
    }

    #[test]
    fn test_category_boundaries() {
        assert_eq!(AqiCategory::from_aqi(0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(50), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(51), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(150), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(151), AqiCategory::Unhealthy);
        assert_eq!(AqiCategory::Moderate.to_string(), "Moderate");
    }
}
