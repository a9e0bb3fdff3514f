//! Refresh routes
//!
//! - `POST /api/v1/data/refresh` - start a run in the background
//! - `GET /api/v1/data/refresh/logs` - most recent run records
//! - `GET /api/v1/data/logs` - same as above

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sales_ingest::RunLogSink;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::features::{shared::resolve_limit, RefreshSettings};
use crate::ingest::{FireOutcome, RefreshScheduler, SchedulerError};

#[derive(Clone)]
pub struct RefreshState {
    pub scheduler: RefreshScheduler,
    pub run_log: Arc<dyn RunLogSink>,
    pub settings: RefreshSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

/// Create refresh routes
pub fn refresh_routes() -> Router<RefreshState> {
    Router::new()
        .route("/refresh", post(trigger_refresh))
        .route("/refresh/logs", get(list_logs))
        .route("/logs", get(list_logs))
}

/// Start a refresh run
///
/// Responds as soon as the run is accepted. The outcome is only visible
/// through the run log.
///
/// - `202 Accepted` - a run was started, or one is already in progress
/// - `500 Internal Server Error` - the scheduler is shut down
#[tracing::instrument(skip(state))]
async fn trigger_refresh(State(state): State<RefreshState>) -> Result<Response, AppError> {
    let message = match state.scheduler.trigger_now(state.settings.manual_timeout) {
        FireOutcome::Started => "Data refresh initiated",
        FireOutcome::Skipped => "Data refresh already in progress",
        FireOutcome::Rejected => return Err(SchedulerError::ShutDown.into()),
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": message,
            "status": "processing",
        })),
    )
        .into_response())
}

/// Most recent run records, newest first
///
/// `GET /api/v1/data/refresh/logs?limit=10`
#[tracing::instrument(skip(state))]
async fn list_logs(
    State(state): State<RefreshState>,
    Query(query): Query<LogsQuery>,
) -> Result<Response, AppError> {
    let limit = resolve_limit(query.limit, state.settings.log_limit);
    let logs = state.run_log.recent(limit).await?;

    Ok((StatusCode::OK, Json(json!({ "logs": logs }))).into_response())
}
