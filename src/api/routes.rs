//! API route definitions
//!
//! - /api/v1/data/* - Live reading and recent AQI series
//! - /api/v1/prediction/* - Forecasts and source breakdown
//! - /api/v1/model/* - Model metrics, status and reload
//! - /api/v1/history/* - History log CRUD and CSV export

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers::{self, ApiState};

/// Routes nested under `/api/v1`
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/", get(handlers::get_index))
        .route("/data/current", get(handlers::get_current))
        .route("/data/last_24h", get(handlers::get_last_24h))
        .route("/prediction", post(handlers::post_prediction))
        .route("/prediction/next_24h", get(handlers::get_next_24h))
        .route("/prediction/sources", get(handlers::get_sources))
        .route("/model/metrics", get(handlers::get_metrics))
        .route("/model/status", get(handlers::get_model_status))
        .route("/model/reload", post(handlers::reload_model))
        .route("/thesis/indicators", get(handlers::get_thesis_indicators))
        .route("/history", get(handlers::get_history))
        .route("/history/record", post(handlers::add_record))
        .route("/history/record/last", delete(handlers::delete_last_record))
        .route("/history/download", get(handlers::download_history))
        .with_state(state)
}

/// Service banner at the root path
pub fn root_routes(state: ApiState) -> Router {
    Router::new()
        .route("/", get(handlers::get_index))
        .with_state(state)
}
