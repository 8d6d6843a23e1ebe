//! Error types for nmos-probe
//!
//! Threshold extraction failures are not errors: they are reported through
//! [`ThresholdResult::success`](crate::extract::ThresholdResult). Empty sweep
//! tables are not errors either; see [`ExtractionStatus`](crate::extract::ExtractionStatus).

use std::path::PathBuf;
use thiserror::Error;

use crate::sweep::Axis;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// nmos-probe error types
#[derive(Error, Debug)]
pub enum Error {
    /// Grid resolution on an axis with no valid samples
    #[error("No {axis} levels available: sweep table has no valid samples on this axis")]
    EmptyGrid {
        /// Axis that was requested
        axis: Axis,
    },

    /// No samples fell inside the drain-voltage tolerance band
    #[error("No samples within tolerance of drain voltage {drain_v} V")]
    EmptySlice {
        /// Resolved drain voltage
        drain_v: f64,
    },

    /// File name does not follow `nmos<W> pattern<P> chip<C>`
    #[error("Unparseable device identity: {0}\nExpected a name like 'nmos5 pattern1 chip2.xls'")]
    UnparseableIdentity(String),

    /// No reader for this input format was compiled in
    #[error("Unsupported input format: {}\nRebuild with the 'xls' feature to read workbooks", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Workbook could not be opened or read
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// Storage error (Parquet/Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Plot rendering failed
    #[error("Plot error: {0}")]
    Plot(String),

    /// Batch directory contains no device files
    #[error("No nmos* pattern* chip* files found in {}", .0.display())]
    NoDeviceFiles(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
