//! Shared utilities for feature modules
//!
//! - **validation**: query parameter checks shared by several handlers

pub mod validation;

pub use validation::{resolve_limit, MAX_LIST_LIMIT};
