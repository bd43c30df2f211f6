//! Forecast endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::config::defaults::MAX_HORIZON_HOURS;
use crate::forecast::{AqiCategory, EngineMode, ForecastEngine, ForecastError};
use crate::types::{FeatureRow, ForecastPoint};

#[derive(Debug, Serialize)]
pub struct PredictedHour {
    #[serde(flatten)]
    pub point: ForecastPoint,
    pub category: AqiCategory,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub mode: EngineMode,
    /// True when the engine has no usable model and the values are
    /// placeholders.
    pub simulated: bool,
    pub model: Option<String>,
    pub forecast: Vec<PredictedHour>,
}

impl ForecastResponse {
    fn new(engine: &ForecastEngine, points: Vec<ForecastPoint>) -> Self {
        let mode = engine.mode();
        Self {
            mode,
            simulated: mode == EngineMode::Degraded,
            model: engine.model_name().map(str::to_string),
            forecast: points
                .into_iter()
                .map(|point| PredictedHour {
                    category: AqiCategory::from_aqi(point.predicted_aqi),
                    point,
                })
                .collect(),
        }
    }
}

/// GET /api/v1/prediction/next_24h - Forecast from the latest dataset rows
pub async fn get_next_24h(State(state): State<ApiState>) -> Response {
    let engine = state.forecast.current();
    match engine.forecast(&state.recent_rows, state.horizon) {
        Ok(points) => ApiResponse::ok(ForecastResponse::new(&engine, points)),
        Err(e @ ForecastError::InsufficientHistory { .. }) => {
            tracing::warn!(error = %e, "Not enough recent history for a forecast");
            ApiErrorResponse::service_unavailable(e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Forecast from recent history failed");
            ApiErrorResponse::internal(e.to_string())
        }
    }
}

/// Request body for a forecast over caller-supplied rows
#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    /// Observed rows, oldest first. At least the model window is needed.
    pub rows: Vec<FeatureRow>,
    /// Optional known future covariates, one row per forecast hour. Their
    /// PM2.5 values are ignored.
    #[serde(default)]
    pub future: Option<Vec<FeatureRow>>,
    #[serde(default)]
    pub horizon: Option<usize>,
}

/// POST /api/v1/prediction - Forecast from caller-supplied rows
///
/// Input problems (short history, invalid measurements, bad horizon) are
/// 400s; a model failure is a 500.
pub async fn post_prediction(
    State(state): State<ApiState>,
    body: Result<Json<ForecastRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return ApiErrorResponse::bad_request(rejection.body_text()),
    };

    let horizon = request.horizon.unwrap_or(state.horizon);
    if horizon == 0 || horizon > MAX_HORIZON_HOURS {
        return ApiErrorResponse::bad_request(format!(
            "horizon must be between 1 and {MAX_HORIZON_HOURS} hours, got {horizon}"
        ));
    }

    let engine = state.forecast.current();
    let result = match &request.future {
        Some(future) => engine.forecast_with_covariates(&request.rows, future, horizon),
        None => engine.forecast(&request.rows, horizon),
    };

    match result {
        Ok(points) => ApiResponse::ok(ForecastResponse::new(&engine, points)),
        Err(e @ ForecastError::Model(_)) => {
            tracing::error!(error = %e, "Model failed on a client forecast request");
            ApiErrorResponse::internal(e.to_string())
        }
        Err(e) => ApiErrorResponse::bad_request(e.to_string()),
    }
}
