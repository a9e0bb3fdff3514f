//! Sales Analytics Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging used across the sales analytics workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`SalesError`] and the [`Result`] alias
//! - **Logging**: environment-driven `tracing` setup shared by the server and the CLI
//!
//! # Example
//!
//! ```no_run
//! use sales_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> sales_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, SalesError};
