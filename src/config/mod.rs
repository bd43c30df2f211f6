//! Application configuration loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `AIRVIEWER_CONFIG` environment variable (path to TOML file)
//! 2. `airviewer.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! config::init(AppConfig::load());
//! let dir = &config::get().forecast.model_dir;
//! ```

mod app_config;
pub mod defaults;
pub mod validation;

pub use app_config::*;

use std::sync::OnceLock;

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored.
pub fn init(config: AppConfig) {
    if APP_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// The global configuration, or the built-in defaults if `init()` was never
/// called (tests, library use).
pub fn get() -> &'static AppConfig {
    APP_CONFIG.get_or_init(AppConfig::default)
}

pub fn is_initialized() -> bool {
    APP_CONFIG.get().is_some()
}
