//! Top-level configuration struct and its sections.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::dataset::SyntheticConfig;
use crate::forecast::{
    DegeneratePolicy, ModelKind, ReservoirConfig, TrainingConfig, DEFAULT_HORIZON,
    DEFAULT_TIME_STEP,
};

use super::defaults;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "AIRVIEWER_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "airviewer.toml";

/// Complete application configuration.
///
/// Every section has `#[serde(default)]`, so a partial TOML file only needs
/// the values it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub thingspeak: ThingSpeakConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// Allowed CORS origins. `"*"` allows any origin; empty means same-origin only.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: defaults::SERVER_ADDR.to_string(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub model_dir: PathBuf,
    pub time_step: usize,
    pub horizon: usize,
    pub test_fraction: f64,
    pub degenerate_policy: DegeneratePolicy,
    pub model: ModelKind,
    pub reservoir: ReservoirConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(defaults::MODEL_DIR),
            time_step: DEFAULT_TIME_STEP,
            horizon: DEFAULT_HORIZON,
            test_fraction: defaults::TEST_FRACTION,
            degenerate_policy: DegeneratePolicy::default(),
            model: ModelKind::default(),
            reservoir: ReservoirConfig::default(),
        }
    }
}

impl ForecastConfig {
    pub fn training(&self) -> TrainingConfig {
        TrainingConfig {
            time_step: self.time_step,
            test_fraction: self.test_fraction,
            degenerate_policy: self.degenerate_policy,
            model: self.model,
            reservoir: self.reservoir.clone(),
        }
    }
}

/// Historical CSV location and the synthetic generator used to create it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: PathBuf,
    #[serde(flatten)]
    pub synthetic: SyntheticConfig,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::DATASET_PATH),
            synthetic: SyntheticConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThingSpeakConfig {
    /// When false, current readings are always simulated.
    pub enabled: bool,
    pub base_url: String,
    pub channel_id: String,
    /// Read API key; only needed for private channels.
    pub read_key: Option<String>,
    pub timeout_secs: u64,
    pub fields: FieldMap,
}

impl Default for ThingSpeakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: defaults::THINGSPEAK_BASE_URL.to_string(),
            channel_id: defaults::THINGSPEAK_CHANNEL_ID.to_string(),
            read_key: None,
            timeout_secs: defaults::THINGSPEAK_TIMEOUT_SECS,
            fields: FieldMap::default(),
        }
    }
}

/// Which channel field carries which pollutant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub pm25: String,
    pub pm10: String,
    pub no2: String,
    pub co: String,
    pub temperature: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            pm25: "field1".to_string(),
            pm10: "field2".to_string(),
            no2: "field3".to_string(),
            co: "field4".to_string(),
            temperature: "field5".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Start with three example records.
    pub seed_records: bool,
    pub max_records: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            seed_records: true,
            max_records: defaults::HISTORY_MAX_RECORDS,
        }
    }
}

impl AppConfig {
    /// Load using the standard search order, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load and validate a specific TOML file. Unknown keys are logged, not
    /// rejected.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Parsed listen address.
    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.addr.parse().map_err(|_| {
            ConfigError::Validation(vec![format!(
                "server.addr: '{}' is not a socket address",
                self.server.addr
            )])
        })
    }

    /// Check every section, collecting all violations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.server.addr.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr: '{}' is not a socket address",
                self.server.addr
            ));
        }

        let f = &self.forecast;
        if f.time_step == 0 {
            errors.push("forecast.time_step must be >= 1".to_string());
        }
        if f.horizon == 0 || f.horizon > defaults::MAX_HORIZON_HOURS {
            errors.push(format!(
                "forecast.horizon = {} must be within 1..={}",
                f.horizon,
                defaults::MAX_HORIZON_HOURS
            ));
        }
        if !(0.0..1.0).contains(&f.test_fraction) {
            errors.push(format!(
                "forecast.test_fraction = {} must be within [0, 1)",
                f.test_fraction
            ));
        }
        let r = &f.reservoir;
        if r.units == 0 {
            errors.push("forecast.reservoir.units must be >= 1".to_string());
        }
        if !r.ridge.is_finite() || r.ridge < 0.0 {
            errors.push(format!(
                "forecast.reservoir.ridge = {} must be finite and >= 0",
                r.ridge
            ));
        }
        if !r.dt.is_finite() || r.dt <= 0.0 {
            errors.push(format!("forecast.reservoir.dt = {} must be > 0", r.dt));
        }
        for (name, value) in [
            ("input_scale", r.input_scale),
            ("recurrent_scale", r.recurrent_scale),
        ] {
            if !value.is_finite() {
                errors.push(format!("forecast.reservoir.{name} must be finite"));
            }
        }

        if self.dataset.synthetic.hours <= f.time_step {
            errors.push(format!(
                "dataset.hours = {} must exceed forecast.time_step = {}",
                self.dataset.synthetic.hours, f.time_step
            ));
        }

        let t = &self.thingspeak;
        if t.enabled {
            if t.channel_id.trim().is_empty() {
                errors.push("thingspeak.channel_id must not be empty".to_string());
            }
            if t.timeout_secs == 0 {
                errors.push("thingspeak.timeout_secs must be >= 1".to_string());
            }
            if !t.base_url.starts_with("http://") && !t.base_url.starts_with("https://") {
                errors.push(format!(
                    "thingspeak.base_url '{}' must start with http:// or https://",
                    t.base_url
                ));
            }
        }

        if self.history.max_records == 0 {
            errors.push("history.max_records must be >= 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}
