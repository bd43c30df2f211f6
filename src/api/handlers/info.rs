//! Service banner and static dashboard figures

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use super::ApiState;
use crate::api::envelope::{ApiResponse, API_VERSION};
use crate::forecast::EngineMode;

#[derive(Debug, Serialize)]
pub struct ServiceBanner {
    pub status: &'static str,
    pub api_version: &'static str,
    pub message: &'static str,
    pub forecast_mode: EngineMode,
}

/// GET / and GET /api/v1 - Service status banner
pub async fn get_index(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(ServiceBanner {
        status: "AirViewer API is RUNNING",
        api_version: API_VERSION,
        message: "Air quality monitoring and 24-hour AQI forecasting",
        forecast_mode: state.forecast.current().mode(),
    })
}

#[derive(Debug, Serialize)]
pub struct SourceBreakdown {
    pub labels: [&'static str; 4],
    /// Percent share per label; sums to 100.
    pub contributions: [u8; 4],
}

/// GET /api/v1/prediction/sources - Estimated pollution source shares
///
/// Static figures from the station's source-apportionment study.
pub async fn get_sources() -> Response {
    ApiResponse::ok(SourceBreakdown {
        labels: [
            "Vehicular traffic",
            "Industrial emissions",
            "Natural sources",
            "Agricultural burning",
        ],
        contributions: [45, 25, 20, 10],
    })
}

/// Project evaluation indicators shown on the dashboard.
#[derive(Debug, Serialize)]
pub struct ThesisIndicators {
    /// Forecast reach, hours.
    #[serde(rename = "TPA_Alcance_Hrs")]
    pub forecast_reach_hours: f64,
    /// Alert response time, seconds.
    #[serde(rename = "TPA_Respuesta_Seg")]
    pub alert_response_secs: f64,
    #[serde(rename = "PPE_Precision_Pct")]
    pub precision_pct: f64,
    /// Share of hours above the guideline value.
    #[serde(rename = "PSC_Superacion_Pct")]
    pub exceedance_pct: f64,
}

/// GET /api/v1/thesis/indicators - Static project indicators
pub async fn get_thesis_indicators() -> Response {
    ApiResponse::ok(ThesisIndicators {
        forecast_reach_hours: 18.44,
        alert_response_secs: 2.4,
        precision_pct: 92.5,
        exceedance_pct: 48.65,
    })
}
