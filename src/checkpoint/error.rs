use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to create output directory '{0}'")]
    OutputDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Output path '{0}' exists but is not a directory")]
    OutputDirNotADirectory(PathBuf),

    #[error("Failed to create temporary file in '{0}'")]
    TempFile(PathBuf, #[source] std::io::Error),

    #[error("Failed to sync '{0}' to disk")]
    Sync(PathBuf, #[source] std::io::Error),

    #[error("Failed to move finished file into place at '{0}'")]
    Persist(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing CSV file '{0}'")]
    CsvWrite(PathBuf, #[source] PolarsError),

    #[error("Encoding error writing parquet file '{0}'")]
    ParquetWrite(PathBuf, #[source] PolarsError),

    #[error("Failed to scan parquet extract '{0}'")]
    ParquetScan(PathBuf, #[source] PolarsError),

    #[error("Failed to build the '{0}' table")]
    Frame(&'static str, #[source] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
