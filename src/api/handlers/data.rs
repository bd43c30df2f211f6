//! Live reading and recent AQI series

use axum::extract::State;
use axum::response::Response;
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Serialize;

use super::ApiState;
use crate::api::envelope::ApiResponse;
use crate::forecast::linear_aqi;
use crate::forecast::normalizer::standardize_row;
use crate::sensors;

/// Points in the recent AQI series.
pub const RECENT_SERIES_HOURS: usize = 24;

/// GET /api/v1/data/current - Latest station reading
///
/// Reads the live feed when one is configured and falls back to a simulated
/// reading (`simulated: true`) when it is absent or fails.
pub async fn get_current(State(state): State<ApiState>) -> Response {
    let reading = sensors::current_reading(state.feed.as_deref(), &state.simulator).await;
    ApiResponse::ok(reading)
}

#[derive(Debug, Clone, Serialize)]
pub struct AqiPoint {
    /// Hour of day, `HH:MM`.
    pub time: String,
    pub aqi: i64,
}

#[derive(Debug, Serialize)]
pub struct RecentSeries {
    pub simulated: bool,
    pub points: Vec<AqiPoint>,
}

/// GET /api/v1/data/last_24h - Hourly AQI for the last day
///
/// Built from the tail of the historical dataset. Without a full day of
/// usable rows the series is random (`simulated: true`).
pub async fn get_last_24h(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(recent_series(&state))
}

fn recent_series(state: &ApiState) -> RecentSeries {
    let rows = state.recent_rows.as_slice();
    if rows.len() >= RECENT_SERIES_HOURS {
        let points: Option<Vec<AqiPoint>> = rows[rows.len() - RECENT_SERIES_HOURS..]
            .iter()
            .map(|row| {
                let std = standardize_row(row).ok()?;
                Some(AqiPoint {
                    time: row.timestamp?.format("%H:%M").to_string(),
                    aqi: linear_aqi(std.pm25_std),
                })
            })
            .collect();
        if let Some(points) = points {
            return RecentSeries {
                simulated: false,
                points,
            };
        }
        tracing::warn!("Recent dataset rows unusable for the AQI series, simulating");
    }

    let now = Utc::now();
    let mut rng = rand::thread_rng();
    let points = (0..RECENT_SERIES_HOURS)
        .rev()
        .map(|hours_ago| AqiPoint {
            time: (now - Duration::hours(hours_ago as i64)).format("%H:%M").to_string(),
            aqi: rng.gen_range(60..=110),
        })
        .collect();
    RecentSeries {
        simulated: true,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{DegradedReason, ForecastEngine, ForecastService, FileArtifactStore};
    use crate::storage::HistoryStore;
    use crate::types::FeatureRow;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn state(rows: Vec<FeatureRow>) -> ApiState {
        let engine = ForecastEngine::degraded(DegradedReason::NotFound, 24);
        ApiState::new(
            Arc::new(ForecastService::new(engine)),
            Arc::new(FileArtifactStore::new("unused")),
            Arc::new(HistoryStore::new()),
        )
        .with_recent_rows(rows)
    }

    fn row(hour: u32) -> FeatureRow {
        FeatureRow {
            timestamp: Some(Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()),
            pm25: 40.0,
            pm10: 80.0,
            temperature: 25.0,
            humidity: 70.0,
            pressure: 1013.25,
            co2: 500.0,
        }
    }

    #[test]
    fn test_series_from_dataset_tail() {
        let series = recent_series(&state((0..24).map(row).collect()));
        assert!(!series.simulated);
        assert_eq!(series.points.len(), 24);
        assert_eq!(series.points[0].time, "00:00");
        assert_eq!(series.points[23].time, "23:00");
        assert!(series.points.iter().all(|p| p.aqi == 100));
    }

    #[test]
    fn test_short_dataset_is_simulated() {
        let series = recent_series(&state((0..5).map(row).collect()));
        assert!(series.simulated);
        assert_eq!(series.points.len(), 24);
        assert!(series.points.iter().all(|p| (60..=110).contains(&p.aqi)));
    }
}
