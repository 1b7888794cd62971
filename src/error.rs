//! Error types for portal-reconcile
//!
//! This module defines the error hierarchy for the reconciliation engine:
//! - Configuration and column-detection errors (fatal, stop before fetching)
//! - Input table errors (fatal, stop before fetching)
//! - Fetch errors (absorbed by the retry coordinator)
//! - Persistence and merge errors (logged, never abort a run)
//!
//! Only [`ReconcileError`] ever reaches the binary. Everything below the
//! batch orchestrator degrades to a default value or a `FetchFailed`
//! classification so that one bad account never halts a batch.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a reconciliation run
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Configuration or schema errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input table could not be read
    #[error("Input error: {0}")]
    Table(#[from] TableError),

    /// I/O errors outside of artifact persistence
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration, CLI and column-detection errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid retry count
    #[error("Invalid retry count {count}: at least one attempt is required")]
    InvalidRetryCount { count: u32 },

    /// Invalid per-attempt wait
    #[error("Invalid wait of {secs}s: must be at least 1 second")]
    InvalidWait { secs: u64 },

    /// Invalid backoff range between attempts
    #[error("Invalid retry sleep range {min}..{max}: bounds must be non-negative and ordered")]
    InvalidBackoff { min: f64, max: f64 },

    /// Invalid chunk sizing
    #[error("Invalid chunking (min chunk size {min_chunk_size}, divisor {divisor}): both must be at least 1")]
    InvalidChunking { min_chunk_size: usize, divisor: usize },

    /// URL template without an account placeholder
    #[error("Invalid URL template '{template}': must contain '{{account}}'")]
    InvalidUrlTemplate { template: String },

    /// Account or amount column could not be found
    #[error(
        "Could not find the required columns. Available columns: {available:?}. \
         Need one account column and one amount column (e.g. 'Account' and 'Amount')"
    )]
    ColumnsNotFound { available: Vec<String> },
}

/// Input table errors
#[derive(Error, Debug)]
pub enum TableError {
    /// Input file could not be opened
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File extension not supported
    #[error("Unsupported input format for '{path}': expected .xlsx, .xls, .ods, .csv or .parquet")]
    UnsupportedFormat { path: PathBuf },

    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet decoding error
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Parquet decoding error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow conversion error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Errors raised by a single fetch attempt
#[derive(Error, Debug)]
pub enum FetchError {
    /// Session could not be provisioned, even with the fallback strategy
    #[error("Failed to create session: {0}")]
    Provision(String),

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Portal answered with a non-success status
    #[error("Portal returned HTTP {status} for account {account}")]
    Status { status: u16, account: String },

    /// Session used after it was destroyed
    #[error("Session already destroyed")]
    SessionClosed,
}

/// Errors writing checkpoint or final artifacts
#[derive(Error, Debug)]
pub enum PersistError {
    /// I/O error
    #[error("I/O error writing '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet writer error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Blocking writer task failed
    #[error("Writer task failed: {0}")]
    Task(String),
}

/// Errors combining chunk reports
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    /// Chunk report columns differ from the merged report
    #[error("Chunk {chunk_id} has columns {found:?}, expected {expected:?}")]
    ColumnMismatch {
        chunk_id: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Result type alias for ReconcileError
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Result type alias for FetchError
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for TableError
pub type TableResult<T> = std::result::Result<T, TableError>;

/// Result type alias for PersistError
pub type PersistResult<T> = std::result::Result<T, PersistError>;
