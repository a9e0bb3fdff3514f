//! Cron job routes
//!
//! - `POST /api/v1/cron/create` - create or replace the job
//! - `DELETE /api/v1/cron/delete` - remove the job
//! - `GET /api/v1/cron/status` - job and run state

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;
use crate::ingest::RefreshScheduler;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCronRequest {
    /// e.g. `1h`, `30m`, `1h30m`
    #[serde(default)]
    pub interval: String,
}

/// Create cron routes
pub fn cron_routes() -> Router<RefreshScheduler> {
    Router::new()
        .route("/create", post(create_job))
        .route("/delete", delete(delete_job))
        .route("/status", get(job_status))
}

/// Create the periodic refresh job, replacing any existing one
///
/// # Request Body
///
/// ```json
/// { "interval": "1h" }
/// ```
///
/// # Response
///
/// - `201 Created` - job armed
/// - `400 Bad Request` - missing, empty or invalid interval
/// - `500 Internal Server Error` - scheduler is shut down
#[tracing::instrument(skip(scheduler, body))]
async fn create_job(
    State(scheduler): State<RefreshScheduler>,
    body: Result<Json<CreateCronRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = body.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let status = scheduler.create(&request.interval)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Cron job created successfully (replaced existing if any)",
            "interval": status.interval,
            "status": status,
        })),
    )
        .into_response())
}

/// Remove the periodic refresh job
///
/// - `200 OK` - job removed
/// - `404 Not Found` - no job exists
#[tracing::instrument(skip(scheduler))]
async fn delete_job(State(scheduler): State<RefreshScheduler>) -> Result<Response, AppError> {
    scheduler.delete()?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Cron job deleted successfully" })),
    )
        .into_response())
}

/// Current job and run state
#[tracing::instrument(skip(scheduler))]
async fn job_status(State(scheduler): State<RefreshScheduler>) -> Json<serde_json::Value> {
    Json(json!(scheduler.status()))
}
