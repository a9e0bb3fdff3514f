//! Refresh infrastructure
//!
//! Everything that decides *when* the ingestion pipeline runs.
//!
//! # Architecture
//!
//! - **config**: ingestion settings (`CSV_FILE_PATH`, `WORKER_POOL_SIZE`, ...)
//! - **interval**: parsing of `30m` / `1h30m` style refresh intervals
//! - **refresh**: the [`RefreshTask`] seam and the CSV-backed implementation
//! - **scheduler**: the single-job, single-flight [`RefreshScheduler`]
//!
//! # Public API
//!
//! The HTTP endpoints live in `features::refresh` and `features::cron`:
//! - `POST /api/v1/data/refresh` - start a run now
//! - `GET /api/v1/data/refresh/logs` - recent run records
//! - `POST /api/v1/cron/create` - create or replace the periodic job
//! - `DELETE /api/v1/cron/delete` - remove the periodic job
//! - `GET /api/v1/cron/status` - job and run state

use thiserror::Error;

pub mod config;
pub mod interval;
pub mod refresh;
pub mod scheduler;

pub use config::IngestConfig;
pub use interval::RefreshInterval;
pub use refresh::{CsvRefresh, RefreshTask};
pub use scheduler::{FireOutcome, JobStatus, RefreshScheduler, SchedulerState, Trigger};

/// Errors returned synchronously by scheduler operations. None of them
/// change scheduler state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("interval is required (e.g., '1h', '30m', '24h')")]
    EmptyInterval,

    #[error("invalid interval {input:?}: {reason}")]
    InvalidInterval { input: String, reason: String },

    #[error("no active cron job to delete")]
    NoActiveJob,

    #[error("scheduler is shut down")]
    ShutDown,
}
