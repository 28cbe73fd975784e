//! Error types for flogger-core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FloggerError {
    #[error("Unknown log entry: {0}")]
    UnknownEntry(String),

    #[error("Log entry already declared: {0}")]
    DuplicateEntry(String),

    #[error("Root path cannot change once entries are declared")]
    PathLocked,

    #[error("Data logger has been shut down")]
    ShutDown,

    #[error("Step {0} does not fit the Parquet step column (max {max})", max = i64::MAX)]
    StepOutOfRange(u64),

    #[error("Failed to start worker runtime: {0}")]
    Runtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FloggerError>;
