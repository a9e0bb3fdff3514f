//! Sales Server Library
//!
//! HTTP server that keeps the sales store loaded from a CSV file and answers
//! revenue queries over it.
//!
//! # Overview
//!
//! - **Refresh scheduling**: one periodic job plus on-demand runs, never more
//!   than one ingestion in flight
//! - **Database**: PostgreSQL persistence for entities and the run log
//! - **API Endpoints**: refresh control, run log, revenue analytics
//! - **Configuration**: environment-based configuration management
//! - **Middleware**: CORS and request logging
//!
//! The ingestion pipeline itself lives in the `sales-ingest` crate; this
//! crate decides when it runs and where it writes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sales_ingest::{IngestionPipeline, MemoryStore};
//! use sales_server::ingest::{CsvRefresh, RefreshScheduler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let pipeline = IngestionPipeline::new(store.clone(), store, 10)?;
//!     let task = Arc::new(CsvRefresh::new(pipeline, "./data/sales_data.csv"));
//!     let scheduler = RefreshScheduler::new(task, Duration::from_secs(600));
//!     scheduler.create("1h")?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::AppError;
