//! Cron feature module
//!
//! Creates, replaces, removes and reports the periodic refresh job.

pub mod routes;

pub use routes::cron_routes;
