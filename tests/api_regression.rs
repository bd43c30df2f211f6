//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! the /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use airviewer::api::{create_app, ApiState};
use airviewer::dataset::{self, SyntheticConfig};
use airviewer::forecast::{
    self, ArtifactStore, DegradedReason, FileArtifactStore, ForecastEngine, ForecastService,
    ModelKind, TrainingConfig,
};
use airviewer::storage::HistoryStore;
use airviewer::types::FeatureRow;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use tracing_subscriber::layer::SubscriberExt;

const TIME_STEP: usize = 24;

fn degraded_state(dir: &std::path::Path) -> ApiState {
    let engine = ForecastEngine::degraded(DegradedReason::NotFound, TIME_STEP);
    ApiState::new(
        Arc::new(ForecastService::new(engine)),
        Arc::new(FileArtifactStore::new(dir)),
        Arc::new(HistoryStore::seeded(chrono::Utc::now())),
    )
}

fn station_rows(hours: usize) -> Vec<FeatureRow> {
    dataset::generate(&SyntheticConfig {
        hours,
        ..SyntheticConfig::default()
    })
}

/// Train a persistence model into `dir` and return a Ready state serving
/// the tail of the same history.
fn ready_state(dir: &std::path::Path) -> ApiState {
    let rows = station_rows(24 * 10);
    let config = TrainingConfig {
        time_step: TIME_STEP,
        model: ModelKind::Persistence,
        ..TrainingConfig::default()
    };
    let pair = forecast::train(&rows, &config).unwrap();
    let store = FileArtifactStore::new(dir);
    store.save(&pair).unwrap();

    let engine = ForecastEngine::load(&store, TIME_STEP);
    ApiState::new(
        Arc::new(ForecastService::new(engine)),
        Arc::new(store),
        Arc::new(HistoryStore::seeded(chrono::Utc::now())),
    )
    .with_recent_rows(rows[rows.len() - TIME_STEP..].to_vec())
}

fn app(state: ApiState) -> Router {
    create_app(state, &["*".to_string()])
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Every read endpoint answers 200, even without a model or live feed.
#[tokio::test]
async fn test_get_endpoints_return_200_when_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let endpoints = [
        "/",
        "/api/v1",
        "/api/v1/data/current",
        "/api/v1/data/last_24h",
        "/api/v1/prediction/next_24h",
        "/api/v1/prediction/sources",
        "/api/v1/model/metrics",
        "/api/v1/model/status",
        "/api/v1/thesis/indicators",
        "/api/v1/history",
        "/api/v1/history/download",
    ];

    for endpoint in endpoints {
        let resp = app(degraded_state(dir.path()))
            .oneshot(get(endpoint))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "GET {endpoint}");
    }
}

#[tokio::test]
async fn test_index_banner() {
    let dir = tempfile::tempdir().unwrap();
    let (status, v) = send(app(degraded_state(dir.path())), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["status"], "AirViewer API is RUNNING");
    assert_eq!(v["data"]["api_version"], "v1");
    assert_eq!(v["data"]["forecast_mode"], "DEGRADED");
    assert_eq!(v["meta"]["version"], "v1");
}

#[tokio::test]
async fn test_current_reading_falls_back_to_simulation() {
    let dir = tempfile::tempdir().unwrap();
    let (_, v) = send(app(degraded_state(dir.path())), get("/api/v1/data/current")).await;
    let reading = &v["data"];
    assert_eq!(reading["simulated"], true);
    let pm25 = reading["pm25"].as_f64().unwrap();
    assert!((15.0..=70.0).contains(&pm25));
    assert!(reading["category"].is_string());
}

#[tokio::test]
async fn test_degraded_next_24h_is_simulated() {
    let dir = tempfile::tempdir().unwrap();
    let (status, v) = send(
        app(degraded_state(dir.path())),
        get("/api/v1/prediction/next_24h"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["simulated"], true);
    assert_eq!(v["data"]["mode"], "DEGRADED");
    let points = v["data"]["forecast"].as_array().unwrap();
    assert_eq!(points.len(), 24);
    for (i, p) in points.iter().enumerate() {
        assert_eq!(p["hour_offset"], i as u64 + 1);
        let aqi = p["predicted_aqi"].as_i64().unwrap();
        assert!((90..=110).contains(&aqi));
    }
}

#[tokio::test]
async fn test_ready_next_24h_uses_model() {
    let dir = tempfile::tempdir().unwrap();
    let state = ready_state(dir.path());

    let (status, v) = send(app(state), get("/api/v1/prediction/next_24h")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["simulated"], false);
    assert_eq!(v["data"]["mode"], "READY");
    assert_eq!(v["data"]["model"], "persistence");
    let points = v["data"]["forecast"].as_array().unwrap();
    assert_eq!(points.len(), 24);
    assert!(points.iter().all(|p| p["predicted_aqi"].as_i64().unwrap() >= 0));
}

#[tokio::test]
async fn test_ready_without_recent_rows_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let state = ready_state(dir.path()).with_recent_rows(Vec::new());

    let (status, v) = send(app(state), get("/api/v1/prediction/next_24h")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(v["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_post_prediction_with_short_history_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let rows = station_rows(5);
    let body = serde_json::json!({ "rows": rows });

    let (status, v) = send(
        app(ready_state(dir.path())),
        post_json("/api/v1/prediction", &body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"]["message"]
        .as_str()
        .unwrap()
        .contains("insufficient history"));
}

#[tokio::test]
async fn test_post_prediction_with_covariates() {
    let dir = tempfile::tempdir().unwrap();
    let rows = station_rows(TIME_STEP + 6);
    let (observed, future) = rows.split_at(TIME_STEP);
    let body = serde_json::json!({ "rows": observed, "future": future, "horizon": 6 });

    let (status, v) = send(
        app(ready_state(dir.path())),
        post_json("/api/v1/prediction", &body),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{v}");
    assert_eq!(v["data"]["forecast"].as_array().unwrap().len(), 6);

    let short = serde_json::json!({ "rows": observed, "future": &future[..2], "horizon": 6 });
    let (status, _) = send(
        app(ready_state(dir.path())),
        post_json("/api/v1/prediction", &short),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_prediction_rejects_bad_horizon_and_body() {
    let dir = tempfile::tempdir().unwrap();
    let body = serde_json::json!({ "rows": [], "horizon": 0 });
    let (status, _) = send(
        app(degraded_state(dir.path())),
        post_json("/api/v1/prediction", &body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, v) = send(
        app(degraded_state(dir.path())),
        post_json("/api/v1/prediction", &serde_json::json!({ "horizon": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_metrics_null_when_degraded_and_set_when_ready() {
    let dir = tempfile::tempdir().unwrap();
    let (_, v) = send(app(degraded_state(dir.path())), get("/api/v1/model/metrics")).await;
    assert!(v["data"]["rmse"].is_null());
    assert!(v["data"]["model_name"].is_null());

    let ready_dir = tempfile::tempdir().unwrap();
    let (_, v) = send(app(ready_state(ready_dir.path())), get("/api/v1/model/metrics")).await;
    assert_eq!(v["data"]["model_name"], "persistence");
    assert!(v["data"]["rmse"].as_f64().unwrap() >= 0.0);
    assert!(v["data"]["last_trained"].is_string());
}

/// Reload picks up artifacts written after startup.
#[tokio::test]
async fn test_reload_swaps_in_trained_model() {
    let dir = tempfile::tempdir().unwrap();
    let state = degraded_state(dir.path());

    let (_, v) = send(app(state.clone()), get("/api/v1/model/status")).await;
    assert_eq!(v["data"]["mode"], "DEGRADED");
    assert_eq!(v["data"]["degraded_reason"]["kind"], "not_found");

    // Train into the same directory the running state reads from.
    let _ = ready_state(dir.path());

    let (status, v) = send(
        app(state.clone()),
        Request::builder()
            .method("POST")
            .uri("/api/v1/model/reload")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["mode"], "READY");
    assert_eq!(v["data"]["time_step"], TIME_STEP);
    assert!(v["data"]["degraded_reason"].is_null());

    let (_, v) = send(app(state), get("/")).await;
    assert_eq!(v["data"]["forecast_mode"], "READY");
}

#[tokio::test]
async fn test_history_add_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let state = degraded_state(dir.path());

    let body = serde_json::json!({
        "timestamp": "2024-05-01T10:00:00Z",
        "pm25": 40.0,
        "pm10": 60.0
    });
    let (status, v) = send(app(state.clone()), post_json("/api/v1/history/record", &body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(v["data"]["record"]["id"], 4);
    assert_eq!(v["data"]["record"]["aqi"], 100);

    let (_, v) = send(app(state.clone()), get("/api/v1/history")).await;
    assert_eq!(v["data"].as_array().unwrap().len(), 4);

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/api/v1/history/record/last")
            .body(Body::empty())
            .unwrap()
    };
    let (status, v) = send(app(state.clone()), delete()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["deleted_id"], 4);

    for _ in 0..3 {
        let (status, _) = send(app(state.clone()), delete()).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, v) = send(app(state), delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["error"]["code"], "NOT_FOUND");
}

/// Counts events whose message equals `message`, at any level.
#[derive(Clone)]
struct MessageCounter {
    message: &'static str,
    hits: Arc<AtomicUsize>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for MessageCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        struct Matches<'a>(&'a str, bool);
        impl tracing::field::Visit for Matches<'_> {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" && format!("{value:?}") == self.0 {
                    self.1 = true;
                }
            }
        }
        let mut visitor = Matches(self.message, false);
        event.record(&mut visitor);
        if visitor.1 {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn test_history_add_is_logged_once() {
    let dir = tempfile::tempdir().unwrap();
    let state = degraded_state(dir.path());
    let counter = MessageCounter {
        message: "History record added",
        hits: Arc::new(AtomicUsize::new(0)),
    };
    let subscriber = tracing_subscriber::registry().with(counter.clone());

    let body = serde_json::json!({
        "timestamp": "2024-05-01T10:00:00Z",
        "pm25": 12.0,
        "pm10": 20.0
    });
    let status = tracing::subscriber::with_default(subscriber, || {
        tokio_test::block_on(send(app(state.clone()), post_json("/api/v1/history/record", &body))).0
    });
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
    assert_eq!(state.history.len().unwrap(), 4);
}

#[tokio::test]
async fn test_history_add_requires_fields() {
    let dir = tempfile::tempdir().unwrap();
    let state = degraded_state(dir.path());

    let missing_pm10 = serde_json::json!({ "timestamp": "2024-05-01T10:00:00Z", "pm25": 40.0 });
    let (status, _) = send(
        app(state.clone()),
        post_json("/api/v1/history/record", &missing_pm10),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let negative = serde_json::json!({
        "timestamp": "2024-05-01T10:00:00Z",
        "pm25": -1.0,
        "pm10": 60.0
    });
    let (status, _) = send(app(state.clone()), post_json("/api/v1/history/record", &negative)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(state.history.len().unwrap(), 3);
}

#[tokio::test]
async fn test_history_download_csv() {
    let dir = tempfile::tempdir().unwrap();
    let state = degraded_state(dir.path());
    let today = chrono::Utc::now().date_naive();
    let uri = format!("/api/v1/history/download?start_date={today}&end_date={today}");

    let resp = app(state.clone()).oneshot(get(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains(&format!("AirViewer_Historical_Data_{today}_to_{today}.csv")));

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("timestamp,AQI,PM2.5,PM10,NO2,CO"));
    // Seeded records span the two hours before now; near midnight some fall on yesterday.
    assert!(lines.count() <= 3);

    let (status, _) = send(
        app(state),
        get("/api/v1/history/download?start_date=yesterday"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_static_figures() {
    let dir = tempfile::tempdir().unwrap();
    let (_, v) = send(app(degraded_state(dir.path())), get("/api/v1/prediction/sources")).await;
    let total: u64 = v["data"]["contributions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_u64().unwrap())
        .sum();
    assert_eq!(total, 100);
    assert_eq!(v["data"]["labels"].as_array().unwrap().len(), 4);

    let (_, v) = send(app(degraded_state(dir.path())), get("/api/v1/thesis/indicators")).await;
    assert_eq!(v["data"]["TPA_Alcance_Hrs"], 18.44);
    assert_eq!(v["data"]["PSC_Superacion_Pct"], 48.65);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let dir = tempfile::tempdir().unwrap();
    let resp = app(degraded_state(dir.path()))
        .oneshot(
            Request::builder()
                .uri("/api/v1/model/status")
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
