//! Refresh feature module
//!
//! Starts ingestion runs on demand and exposes the run log.

pub mod routes;

pub use routes::{refresh_routes, RefreshState};
