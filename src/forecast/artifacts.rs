//! Persistence of the trained model / fitted scaler pair.
//!
//! A model directory holds two JSON files written atomically (temp file,
//! then rename):
//!
//! - `model.json`: [`ModelCheckpoint`], the regressor plus provenance
//! - `scaler.json`: [`FittedScaler`]
//!
//! Both files or neither: a directory with only one of them is reported as
//! corrupt, never as a usable half-pair.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::types::ArtifactMetadata;

use super::{FittedScaler, ForecastError, PersistenceRegressor, Regressor, ReservoirRegressor, Window};

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";

/// Concrete regressors that can be persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    Persistence(PersistenceRegressor),
    Reservoir(ReservoirRegressor),
}

impl TrainedModel {
    fn inner(&self) -> &dyn Regressor {
        match self {
            Self::Persistence(m) => m,
            Self::Reservoir(m) => m,
        }
    }
}

impl Regressor for TrainedModel {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn fit(&mut self, windows: &[Window]) -> Result<(), ForecastError> {
        match self {
            Self::Persistence(m) => m.fit(windows),
            Self::Reservoir(m) => m.fit(windows),
        }
    }

    fn predict(&self, window: &[Vec<f64>]) -> Result<f64, ForecastError> {
        self.inner().predict(window)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }

    fn input_shape(&self) -> Option<(usize, usize)> {
        self.inner().input_shape()
    }

    fn target_column(&self) -> Option<usize> {
        self.inner().target_column()
    }

    fn validate(&self) -> Result<(), ForecastError> {
        self.inner().validate()
    }
}

/// On-disk form of `model.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub version: u32,
    pub metadata: ArtifactMetadata,
    pub model: TrainedModel,
}

/// Trained regressor, its scaler and provenance.
#[derive(Debug, Clone)]
pub struct ArtifactPair {
    pub model: Arc<TrainedModel>,
    pub scaler: FittedScaler,
    pub metadata: ArtifactMetadata,
}

/// Artifact loading failures. `NotFound` and `Corrupt` are kept apart so
/// startup logs can tell "never trained" from "broken files".
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no trained artifacts at {0}")]
    NotFound(PathBuf),

    #[error("corrupt artifact {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where the artifact pair lives between process runs.
pub trait ArtifactStore: Send + Sync {
    fn load(&self) -> Result<ArtifactPair, LoadError>;

    fn save(&self, pair: &ArtifactPair) -> Result<(), SaveError>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

/// JSON files in a model directory.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_FILE)
    }
}

impl ArtifactStore for FileArtifactStore {
    fn load(&self) -> Result<ArtifactPair, LoadError> {
        let model_path = self.model_path();
        let scaler_path = self.scaler_path();

        match (model_path.exists(), scaler_path.exists()) {
            (false, false) => return Err(LoadError::NotFound(self.dir.clone())),
            (true, false) => {
                return Err(LoadError::Corrupt {
                    path: scaler_path,
                    reason: "model present without its scaler".to_string(),
                })
            }
            (false, true) => {
                return Err(LoadError::Corrupt {
                    path: model_path,
                    reason: "scaler present without its model".to_string(),
                })
            }
            (true, true) => {}
        }

        let checkpoint: ModelCheckpoint = read_json(&model_path)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(LoadError::Corrupt {
                path: model_path,
                reason: format!(
                    "unsupported checkpoint version {} (expected {CHECKPOINT_VERSION})",
                    checkpoint.version
                ),
            });
        }

        checkpoint.model.validate().map_err(|e| LoadError::Corrupt {
            path: model_path,
            reason: e.to_string(),
        })?;

        let scaler: FittedScaler = read_json(&scaler_path)?;
        scaler.validate().map_err(|e| LoadError::Corrupt {
            path: scaler_path,
            reason: e.to_string(),
        })?;

        Ok(ArtifactPair {
            model: Arc::new(checkpoint.model),
            scaler,
            metadata: checkpoint.metadata,
        })
    }

    fn save(&self, pair: &ArtifactPair) -> Result<(), SaveError> {
        let checkpoint = ModelCheckpoint {
            version: CHECKPOINT_VERSION,
            metadata: pair.metadata.clone(),
            model: pair.model.as_ref().clone(),
        };
        write_atomic(&self.model_path(), &serde_json::to_vec_pretty(&checkpoint)?)?;
        write_atomic(&self.scaler_path(), &serde_json::to_vec_pretty(&pair.scaler)?)?;
        tracing::info!(dir = %self.dir.display(), model = %pair.metadata.model_name, "Saved model artifacts");
        Ok(())
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let data = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|e| LoadError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write to a temp file alongside the target, then rename over it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SaveError> {
    let io_err = |source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, bytes).map_err(io_err)?;
    std::fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}
