//! Feature modules implementing the sales API
//!
//! Each feature is a vertical slice with its own routes and handlers.
//!
//! # Features
//!
//! - **refresh**: start a refresh now and read the run log
//! - **cron**: manage the periodic refresh job
//! - **revenue**: revenue totals over a date range

pub mod cron;
pub mod refresh;
pub mod revenue;
pub mod shared;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sales_ingest::{RunLogSink, SalesAnalytics};

use crate::ingest::RefreshScheduler;

/// Settings the refresh handlers need from configuration
#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    /// Deadline of runs started over HTTP
    pub manual_timeout: Duration,
    /// Run log page size when the caller gives none
    pub log_limit: usize,
}

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub scheduler: RefreshScheduler,
    pub run_log: Arc<dyn RunLogSink>,
    pub analytics: Arc<dyn SalesAnalytics>,
    pub settings: RefreshSettings,
}

/// Creates the API router with all feature routes mounted
///
/// - `/data` - manual refresh and run log
/// - `/cron` - periodic refresh job
/// - `/revenue` - revenue analytics
pub fn router(state: FeatureState) -> Router<()> {
    let refresh_state = refresh::RefreshState {
        scheduler: state.scheduler.clone(),
        run_log: state.run_log,
        settings: state.settings,
    };

    Router::new()
        .nest("/data", refresh::refresh_routes().with_state(refresh_state))
        .nest("/cron", cron::cron_routes().with_state(state.scheduler))
        .nest("/revenue", revenue::revenue_routes().with_state(state.analytics))
}
