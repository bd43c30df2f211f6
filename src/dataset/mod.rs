//! Historical measurement data: CSV load/save, synthetic generation and
//! hourly continuity checks.
//!
//! The forecaster assumes consecutive hourly rows. Nothing here fills gaps;
//! [`check_continuity`] reports them so the caller can decide.

pub mod csv;
pub mod synthetic;

pub use self::csv::{parse_csv, read_csv, write_csv, CSV_HEADER};
pub use synthetic::{generate, SyntheticConfig};

use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::FeatureRow;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {index} has no timestamp")]
    MissingTimestamp { index: usize },

    #[error("gap in hourly series: {after} is followed by {next}")]
    Gap {
        after: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    #[error("timestamps out of order: {previous} is followed by {next}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        next: DateTime<Utc>,
    },
}

/// Check that `rows` are strictly increasing, exactly one hour apart.
pub fn check_continuity(rows: &[FeatureRow]) -> Result<(), DatasetError> {
    let step = Duration::hours(1);
    let mut previous: Option<DateTime<Utc>> = None;

    for (index, row) in rows.iter().enumerate() {
        let ts = row.timestamp.ok_or(DatasetError::MissingTimestamp { index })?;
        if let Some(prev) = previous {
            if ts <= prev {
                return Err(DatasetError::OutOfOrder {
                    previous: prev,
                    next: ts,
                });
            }
            if ts - prev != step {
                return Err(DatasetError::Gap {
                    after: prev,
                    next: ts,
                });
            }
        }
        previous = Some(ts);
    }
    Ok(())
}

/// Read a CSV history file and verify it is gap-free.
pub fn load_history(path: &Path) -> Result<Vec<FeatureRow>, DatasetError> {
    let rows = read_csv(path)?;
    check_continuity(&rows)?;
    Ok(rows)
}
