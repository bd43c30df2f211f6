//! AirViewer - air-quality monitoring and AQI forecasting backend
//!
//! # Usage
//!
//! ```bash
//! # Create a synthetic station history, train on it, then serve
//! airviewer generate-data
//! airviewer train
//! airviewer serve --addr 127.0.0.1:5000
//! ```
//!
//! # Environment Variables
//!
//! - `AIRVIEWER_CONFIG`: Path to the TOML config (default: `./airviewer.toml`)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use airviewer::api::{create_app, ApiState};
use airviewer::config::{self, AppConfig};
use airviewer::dataset::{self, SyntheticConfig};
use airviewer::forecast::{
    self, ArtifactStore, EngineMode, FileArtifactStore, ForecastEngine, ForecastService,
};
use airviewer::sensors::{SensorFeed, ThingSpeakFeed};
use airviewer::storage::HistoryStore;
use airviewer::types::FeatureRow;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "airviewer")]
#[command(about = "AirViewer air-quality monitoring and AQI forecasting backend")]
#[command(version)]
struct CliArgs {
    /// Config file to use instead of the standard search order
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the HTTP API (default)
    Serve {
        /// Override the server address (default: "0.0.0.0:5000")
        #[arg(short, long, value_name = "HOST:PORT")]
        addr: Option<String>,
    },

    /// Train a forecaster on the historical CSV and save the artifacts
    Train {
        /// Historical CSV (default: dataset.path)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Artifact directory (default: forecast.model_dir)
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },

    /// Write a synthetic hourly station history as CSV
    GenerateData {
        /// Output CSV (default: dataset.path)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Number of hourly rows
        #[arg(long)]
        hours: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let config = AppConfig::load();
            config.validate().context("Invalid configuration")?;
            Ok(config)
        }
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_generate_data(
    cfg: &AppConfig,
    out: Option<PathBuf>,
    hours: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let out = out.unwrap_or_else(|| cfg.dataset.path.clone());
    let synthetic = SyntheticConfig {
        hours: hours.unwrap_or(cfg.dataset.synthetic.hours),
        seed: seed.unwrap_or(cfg.dataset.synthetic.seed),
        ..cfg.dataset.synthetic.clone()
    };

    let rows = dataset::generate(&synthetic);
    dataset::write_csv(&out, &rows)
        .with_context(|| format!("Failed to write synthetic dataset to {}", out.display()))?;
    info!(rows = rows.len(), seed = synthetic.seed, path = %out.display(), "Synthetic dataset written");
    Ok(())
}

fn run_train(cfg: &AppConfig, data: Option<PathBuf>, model_dir: Option<PathBuf>) -> Result<()> {
    let data = data.unwrap_or_else(|| cfg.dataset.path.clone());
    let model_dir = model_dir.unwrap_or_else(|| cfg.forecast.model_dir.clone());

    let rows = dataset::load_history(&data).with_context(|| {
        format!(
            "Failed to load training data from {} (run `airviewer generate-data` to create one)",
            data.display()
        )
    })?;

    let training = cfg.forecast.training();
    info!(rows = rows.len(), model = ?training.model, time_step = training.time_step, "Training forecaster");
    let pair = forecast::train(&rows, &training).context("Training failed")?;

    let store = FileArtifactStore::new(&model_dir);
    store
        .save(&pair)
        .with_context(|| format!("Failed to save artifacts to {}", model_dir.display()))?;

    match &pair.metadata.metrics {
        Some(m) => info!(rmse = m.rmse, mae = m.mae, r2 = m.r2, "Training complete"),
        None => warn!("Training complete, but the hold-out split was empty"),
    }
    Ok(())
}

/// Tail of the historical dataset used for `next_24h` and `last_24h`.
fn recent_rows(cfg: &AppConfig) -> Vec<FeatureRow> {
    let keep = cfg.forecast.time_step.max(airviewer::api::handlers::RECENT_SERIES_HOURS);
    match dataset::load_history(&cfg.dataset.path) {
        Ok(mut rows) => {
            let skip = rows.len().saturating_sub(keep);
            rows.drain(..skip);
            info!(rows = rows.len(), path = %cfg.dataset.path.display(), "Recent history loaded");
            rows
        }
        Err(e) => {
            warn!(path = %cfg.dataset.path.display(), error = %e, "No usable historical dataset, recent series will be simulated");
            Vec::new()
        }
    }
}

async fn run_serve(cfg: &AppConfig, addr: Option<String>) -> Result<()> {
    let server_addr = match addr {
        Some(addr) => addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid server address '{addr}'"))?,
        None => cfg.server_addr().context("Invalid server.addr")?,
    };

    let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::new(&cfg.forecast.model_dir));
    let engine = ForecastEngine::load(store.as_ref(), cfg.forecast.time_step);
    if engine.mode() == EngineMode::Degraded {
        warn!("Forecasts will be simulated until a model is trained and reloaded");
    }
    let service = Arc::new(ForecastService::new(engine));

    let history = if cfg.history.seed_records {
        HistoryStore::seeded(chrono::Utc::now())
    } else {
        HistoryStore::new()
    }
    .with_max_records(cfg.history.max_records);

    let mut state = ApiState::new(service, store, Arc::new(history))
        .with_recent_rows(recent_rows(cfg))
        .with_horizon(cfg.forecast.horizon);

    if cfg.thingspeak.enabled {
        match ThingSpeakFeed::new(&cfg.thingspeak) {
            Ok(feed) => {
                info!(url = feed.url(), "Live readings from ThingSpeak");
                let feed: Arc<dyn SensorFeed> = Arc::new(feed);
                state = state.with_feed(feed);
            }
            Err(e) => warn!(error = %e, "ThingSpeak client unavailable, readings will be simulated"),
        }
    } else {
        info!("ThingSpeak disabled, readings will be simulated");
    }

    let app = create_app(state, &cfg.server.cors_origins);
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("Failed to bind to {server_addr}"))?;
    info!("HTTP server listening on {}", server_addr);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
        })
        .await;
    if let Err(e) = &result {
        error!("HTTP server error: {}", e);
    }
    result.context("HTTP server error")
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    config::init(load_config(args.config.as_ref())?);
    let cfg = config::get();

    match args.command.unwrap_or(SubCommand::Serve { addr: None }) {
        SubCommand::GenerateData { out, hours, seed } => run_generate_data(cfg, out, hours, seed),
        SubCommand::Train { data, model_dir } => {
            tokio::task::spawn_blocking(move || run_train(cfg, data, model_dir))
                .await
                .context("Training task panicked")?
        }
        SubCommand::Serve { addr } => {
            info!("AirViewer API starting");
            run_serve(cfg, addr).await?;
            info!("AirViewer shutdown complete");
            Ok(())
        }
    }
}
