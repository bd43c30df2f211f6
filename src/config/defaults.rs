//! Built-in default values, grouped by subsystem.

// ============================================================================
// Server
// ============================================================================

/// Listen address of the HTTP API.
pub const SERVER_ADDR: &str = "0.0.0.0:5000";

// ============================================================================
// Forecasting
// ============================================================================

/// Directory holding `model.json` and `scaler.json`.
pub const MODEL_DIR: &str = "model";

/// Fraction of windows held out for evaluation.
pub const TEST_FRACTION: f64 = 0.2;

/// Upper bound accepted for `forecast.horizon` (one week).
pub const MAX_HORIZON_HOURS: usize = 168;

// ============================================================================
// Dataset
// ============================================================================

/// Historical CSV used for training and as serving history.
pub const DATASET_PATH: &str = "data/historical_data.csv";

// ============================================================================
// ThingSpeak
// ============================================================================

pub const THINGSPEAK_BASE_URL: &str = "https://api.thingspeak.com";

/// Public channel of the monitoring station.
pub const THINGSPEAK_CHANNEL_ID: &str = "2989972";

/// HTTP timeout for feed requests (seconds).
pub const THINGSPEAK_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// History log
// ============================================================================

/// Records kept before the oldest is evicted.
pub const HISTORY_MAX_RECORDS: usize = 10_000;
