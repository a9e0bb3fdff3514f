//! Ingestion and persistence error types

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::models::{EntityKind, RunRecord};

/// Result type alias for persistence adapters
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure reported by a persistence adapter or run log sink
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend rejected or failed the operation
    #[error("store backend error: {0}")]
    Backend(String),

    /// The backend could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Everything that can fail an ingestion run
///
/// Only the first error of a run is kept; it becomes the run's `error_msg`.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    /// The source could not be opened
    #[error("failed to open file {}: {source}", path.display())]
    SourceAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The header line could not be read (including an empty source)
    #[error("failed to read header: {0}")]
    Header(String),

    /// A data row was unreadable or did not have the expected width.
    /// `row` is 1-based and does not count the header.
    #[error("error reading row {row}: {reason}")]
    SourceFormat { row: u64, reason: String },

    /// A field that must parse did not (only the sale date)
    #[error("failed to parse {field} {value:?} for order {order_id}: {reason}")]
    FieldParse {
        field: &'static str,
        value: String,
        order_id: String,
        reason: String,
    },

    #[error("failed to upsert {kind} {key:?}: {source}")]
    Persistence {
        kind: EntityKind,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("ingestion cancelled")]
    Cancelled,

    #[error("ingestion timed out after {0:?}")]
    TimedOut(Duration),

    #[error("ingestion {task} panicked: {message}")]
    TaskPanicked { task: String, message: String },

    /// The run finished but its record could not be written to the run log
    #[error("failed to append run log: {source}")]
    RunLog {
        record: Box<RunRecord>,
        #[source]
        source: StoreError,
    },
}
