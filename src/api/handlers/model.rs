//! Model metrics, status and hot reload

use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ApiState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::forecast::{DegradedReason, EngineMode, ForecastEngine};

/// Hold-out metrics of the active model; every field is null when no model
/// is loaded or the hold-out split was empty.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub model_name: Option<String>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub r2: Option<f64>,
    pub last_trained: Option<DateTime<Utc>>,
}

/// GET /api/v1/model/metrics - Hold-out metrics of the active model
pub async fn get_metrics(State(state): State<ApiState>) -> Response {
    let engine = state.forecast.current();
    let metadata = engine.metadata();
    let metrics = metadata.and_then(|m| m.metrics);

    ApiResponse::ok(MetricsResponse {
        model_name: engine.model_name().map(str::to_string),
        rmse: metrics.map(|m| m.rmse),
        mae: metrics.map(|m| m.mae),
        r2: metrics.map(|m| m.r2),
        last_trained: metadata.map(|m| m.trained_at),
    })
}

#[derive(Debug, Serialize)]
pub struct ModelStatus {
    pub mode: EngineMode,
    pub degraded_reason: Option<DegradedReason>,
    pub model_name: Option<String>,
    pub time_step: usize,
    pub horizon: usize,
    pub trained_at: Option<DateTime<Utc>>,
    pub train_windows: Option<usize>,
    pub test_windows: Option<usize>,
    pub artifact_location: String,
}

impl ModelStatus {
    fn new(engine: &ForecastEngine, state: &ApiState) -> Self {
        let metadata = engine.metadata();
        Self {
            mode: engine.mode(),
            degraded_reason: engine.degraded_reason().cloned(),
            model_name: engine.model_name().map(str::to_string),
            time_step: engine.time_step(),
            horizon: state.horizon,
            trained_at: metadata.map(|m| m.trained_at),
            train_windows: metadata.map(|m| m.train_windows),
            test_windows: metadata.map(|m| m.test_windows),
            artifact_location: state.artifacts.location(),
        }
    }
}

/// GET /api/v1/model/status - Engine mode and artifact summary
pub async fn get_model_status(State(state): State<ApiState>) -> Response {
    let engine = state.forecast.current();
    ApiResponse::ok(ModelStatus::new(&engine, &state))
}

/// POST /api/v1/model/reload - Re-read artifacts and hot-swap the engine
///
/// Requests already running keep the engine they started with. A reload that
/// finds no usable artifacts installs a degraded engine; that is reported in
/// the returned status, not as an error.
pub async fn reload_model(State(state): State<ApiState>) -> Response {
    let time_step = state.forecast.current().time_step();
    let service = state.forecast.clone();
    let store = state.artifacts.clone();

    let reloaded =
        tokio::task::spawn_blocking(move || service.reload(store.as_ref(), time_step)).await;
    match reloaded {
        Ok(mode) => {
            tracing::info!(mode = %mode, location = %state.artifacts.location(), "Model reloaded via API");
            let engine = state.forecast.current();
            ApiResponse::ok(ModelStatus::new(&engine, &state))
        }
        Err(e) => {
            tracing::error!(error = %e, "Model reload task failed");
            ApiErrorResponse::internal(format!("reload failed: {e}"))
        }
    }
}
