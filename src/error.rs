//! Error types for ingestion, configuration and report writing.
//!
//! The allocation engine itself never fails: placement misses and bad
//! references are counted or skipped. Only the I/O edges return these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing column '{column}' in {file}")]
    MissingColumn { file: String, column: String },

    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid time of day: {0}")]
    InvalidTime(String),
}

impl SchedulerError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_column(file: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            file: file.into(),
            column: column.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
