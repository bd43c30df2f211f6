//! History log endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::storage::{NewRecord, StoreError};
use crate::types::HistoryRecord;

fn storage_failure(e: &StoreError) -> Response {
    tracing::error!(error = %e, "History store failure");
    ApiErrorResponse::internal(e.to_string())
}

/// GET /api/v1/history - All history records, oldest first
pub async fn get_history(State(state): State<ApiState>) -> Response {
    match state.history.list() {
        Ok(records) => ApiResponse::ok(records),
        Err(e) => storage_failure(&e),
    }
}

#[derive(Debug, Serialize)]
pub struct RecordAdded {
    pub message: &'static str,
    pub record: HistoryRecord,
}

/// POST /api/v1/history/record - Add a record
///
/// `timestamp`, `pm25` and `pm10` are required; AQI is derived from PM2.5.
/// Returns 201 with the stored record.
pub async fn add_record(
    State(state): State<ApiState>,
    body: Result<Json<NewRecord>, JsonRejection>,
) -> Response {
    let Json(new) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return ApiErrorResponse::bad_request(format!(
                "timestamp, pm25 and pm10 are required: {}",
                rejection.body_text()
            ))
        }
    };

    match state.history.add(new) {
        Ok(record) => {
            tracing::info!(id = record.id, aqi = record.aqi, "History record added");
            ApiResponse::created(RecordAdded {
                message: "record added",
                record,
            })
        }
        Err(e @ StoreError::Invalid { .. }) => ApiErrorResponse::bad_request(e.to_string()),
        Err(e) => storage_failure(&e),
    }
}

#[derive(Debug, Serialize)]
pub struct RecordDeleted {
    pub message: &'static str,
    pub deleted_id: u64,
}

/// DELETE /api/v1/history/record/last - Remove the newest record
pub async fn delete_last_record(State(state): State<ApiState>) -> Response {
    match state.history.delete_last() {
        Ok(record) => {
            tracing::info!(id = record.id, "History record deleted");
            ApiResponse::ok(RecordDeleted {
                message: "last record deleted",
                deleted_id: record.id,
            })
        }
        Err(StoreError::Empty) => ApiErrorResponse::not_found("no records to delete"),
        Err(e) => storage_failure(&e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn parse_date(raw: Option<&str>, name: &str) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("{name} must be YYYY-MM-DD, got '{s}'")),
    }
}

/// GET /api/v1/history/download - CSV export
///
/// Optional `start_date` / `end_date` (`YYYY-MM-DD`, inclusive) filter the
/// records. Served as an attachment named after the date range.
pub async fn download_history(
    State(state): State<ApiState>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let (start, end) = match (
        parse_date(query.start_date.as_deref(), "start_date"),
        parse_date(query.end_date.as_deref(), "end_date"),
    ) {
        (Ok(start), Ok(end)) => (start, end),
        (Err(e), _) | (_, Err(e)) => return ApiErrorResponse::bad_request(e),
    };

    let csv = match state.history.export_csv(start, end) {
        Ok(csv) => csv,
        Err(e) => return storage_failure(&e),
    };

    let label = |d: Option<NaiveDate>, open: &str| {
        d.map_or_else(|| open.to_string(), |d| d.format("%Y-%m-%d").to_string())
    };
    let filename = format!(
        "AirViewer_Historical_Data_{}_to_{}.csv",
        label(start, "start"),
        label(end, "end")
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    )
        .into_response()
}
