//! Sales Ingest Library
//!
//! Loads sales rows from a CSV file into keyed customer, product and order
//! collections, logs one record per ingestion run, and answers revenue
//! queries over the loaded orders.
//!
//! # Modules
//!
//! - [`record`]: source row layout and the parsing policy for each column
//! - [`store`]: persistence traits and the in-memory store
//! - [`pipeline`]: the concurrent reader/worker ingestion pipeline
//! - [`analytics`]: revenue totals by product, category and region
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sales_ingest::{IngestionPipeline, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let pipeline = IngestionPipeline::new(store.clone(), store.clone(), 10)?;
//!     let record = pipeline.run("./data/sales_data.csv").await?;
//!     println!("loaded {} rows", record.rows_loaded);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod analytics;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod record;
pub mod store;

pub use analytics::{DateRange, DateRangeError, SalesAnalytics};
pub use error::{IngestError, StoreError, StoreResult};
pub use models::{Customer, EntityDocument, EntityKind, Order, Product, RunRecord, RunStatus};
pub use pipeline::{IngestionPipeline, RunControl};
pub use record::SourceRecord;
pub use store::{EntityStore, MemoryStore, RunLogSink, StoreCounts};
