//! API route handlers
//!
//! - Service banner and static dashboard figures
//! - Live sensor reading and recent AQI series
//! - 24-hour forecasts and model status
//! - History log CRUD and CSV export

mod data;
mod history;
mod info;
mod model;
mod prediction;

pub use data::*;
pub use history::*;
pub use info::*;
pub use model::*;
pub use prediction::*;

use std::sync::Arc;

use crate::forecast::{ArtifactStore, ForecastService, DEFAULT_HORIZON};
use crate::sensors::{SensorFeed, SimulatedFeed};
use crate::storage::HistoryStore;
use crate::types::FeatureRow;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Active forecast engine, hot-swappable
    pub forecast: Arc<ForecastService>,
    /// Where `POST /model/reload` reads artifacts from
    pub artifacts: Arc<dyn ArtifactStore>,
    /// In-memory history log
    pub history: Arc<HistoryStore>,
    /// Live station feed; `None` serves simulated readings only
    pub feed: Option<Arc<dyn SensorFeed>>,
    pub simulator: SimulatedFeed,
    /// Tail of the historical dataset, oldest first
    pub recent_rows: Arc<Vec<FeatureRow>>,
    /// Hours forecast by `GET /prediction/next_24h`
    pub horizon: usize,
}

impl ApiState {
    pub fn new(
        forecast: Arc<ForecastService>,
        artifacts: Arc<dyn ArtifactStore>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            forecast,
            artifacts,
            history,
            feed: None,
            simulator: SimulatedFeed::new(),
            recent_rows: Arc::new(Vec::new()),
            horizon: DEFAULT_HORIZON,
        }
    }

    pub fn with_feed(mut self, feed: Arc<dyn SensorFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_recent_rows(mut self, rows: Vec<FeatureRow>) -> Self {
        self.recent_rows = Arc::new(rows);
        self
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }
}
