//! Revenue feature module
//!
//! Read-only revenue projections over the loaded orders.

pub mod routes;

pub use routes::revenue_routes;
