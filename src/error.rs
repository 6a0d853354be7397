// External crates
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the forecasting pipeline. Every variant is fatal for a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input file missing or unreadable, or a required column is absent
    #[error("Ingestion failed for {path}: {reason}")]
    Ingestion { path: PathBuf, reason: String },

    /// A `date` key that is not a valid `YYYYMMDDHH` value
    #[error("Malformed date key {value} at row {row} (expected YYYYMMDDHH)")]
    MalformedKey { row: usize, value: String },

    /// Feature matrix and target vector disagree after the target shift
    #[error("Alignment failed: {0}")]
    Alignment(String),

    /// Not enough usable rows left to continue
    #[error("Data quality check failed: {0}")]
    DataQuality(String),

    /// Estimator fit/predict failure or invalid search setup
    #[error("Model error: {0}")]
    Model(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn ingestion(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Ingestion {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
