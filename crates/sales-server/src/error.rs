//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sales_ingest::{DateRangeError, StoreError};
use serde_json::json;
use thiserror::Error;

use crate::ingest::SchedulerError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Invalid date range: {0}")]
    DateRange(#[from] DateRangeError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
            AppError::Scheduler(e) => match e {
                SchedulerError::EmptyInterval | SchedulerError::InvalidInterval { .. } => {
                    StatusCode::BAD_REQUEST
                },
                SchedulerError::NoActiveJob => StatusCode::NOT_FOUND,
                SchedulerError::ShutDown => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::DateRange(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                "A database error occurred".to_string()
            },
            AppError::Store(ref e) => {
                tracing::error!("Store error: {}", e);
                "A storage error occurred".to_string()
            },
            AppError::Scheduler(ref e) => {
                if status.is_server_error() {
                    tracing::error!("Scheduler error: {}", e);
                }
                e.to_string()
            },
            AppError::DateRange(ref e) => e.to_string(),
            AppError::NotFound(ref message) | AppError::Validation(ref message) => message.clone(),
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                message.clone()
            },
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
