//! Error types for Mobility Flux

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Unrecognized date format: {0}")]
    DateFormatError(String),

    #[error("Stringency column is neither metadata nor a date: {0}")]
    ColumnFormatError(String),

    #[error("Schema mismatch: {0}")]
    SchemaError(String),

    #[error("Stringency data not available for the selected period {from} to {to}")]
    EmptyRangeError { from: NaiveDate, to: NaiveDate },

    #[error("Failed to parse value: {0}")]
    ParseError(String),

    #[error("Clustering failed: {0}")]
    ClusteringError(String),

    #[error("Spreadsheet error: {0}")]
    WorkbookError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ComputeError {
    /// Whether the run can continue with an empty result instead of aborting.
    pub fn is_notice(&self) -> bool {
        matches!(self, ComputeError::EmptyRangeError { .. })
    }
}
