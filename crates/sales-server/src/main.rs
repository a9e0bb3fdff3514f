//! Sales Server - Main entry point

use std::sync::Arc;
use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sales_common::logging::{init_logging, LogConfig};
use sales_ingest::IngestionPipeline;
use serde_json::json;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tracing::{error, info, warn};

use sales_server::{
    config::Config,
    db::{self, DbConfig, PgSalesStore},
    features::{self, FeatureState, RefreshSettings},
    ingest::{CsvRefresh, IngestConfig, RefreshScheduler},
    middleware,
};

/// How long a cancelled refresh run gets to record its outcome at shutdown
const CANCEL_WAIT: Duration = Duration::from_secs(10);

/// Application state for the root routes
#[derive(Clone)]
struct AppState {
    db: sqlx::PgPool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("sales-server")
        .filter_directives("sales_server=debug,sales_ingest=info,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting sales server");

    let config = Config::load()?;
    let ingest_config = IngestConfig::from_env()?;
    info!(
        bind = %config.bind_address(),
        csv_file = %ingest_config.csv_file_path.display(),
        workers = ingest_config.worker_pool_size,
        "Configuration loaded"
    );

    let db_pool = db::create_pool(&DbConfig::from(&config.database)).await?;
    db::run_migrations(&db_pool).await?;

    let store = Arc::new(PgSalesStore::new(db_pool.clone()));
    let pipeline =
        IngestionPipeline::new(store.clone(), store.clone(), ingest_config.worker_pool_size)?;
    let task = Arc::new(CsvRefresh::new(pipeline, ingest_config.csv_file_path.clone()));
    let scheduler = RefreshScheduler::new(task, ingest_config.run_timeout());

    if let Some(interval) = &ingest_config.refresh_interval {
        let status = scheduler.create(interval)?;
        info!(job_id = status.job_id, interval = %interval, "Startup refresh job created");
    }

    let feature_state = FeatureState {
        scheduler: scheduler.clone(),
        run_log: store.clone(),
        analytics: store,
        settings: RefreshSettings {
            manual_timeout: ingest_config.manual_timeout(),
            log_limit: ingest_config.log_limit,
        },
    };

    let app = create_router(AppState { db: db_pool }, feature_state, &config);

    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
    if tokio::time::timeout(grace, scheduler.shutdown()).await.is_err() {
        warn!(?grace, "Refresh run did not finish in time, cancelling it");
        scheduler.cancel_running();
        // A cancelled run still writes its failed record before it ends
        if tokio::time::timeout(CANCEL_WAIT, scheduler.wait_idle()).await.is_err() {
            error!(wait = ?CANCEL_WAIT, "Refresh run ignored cancellation, abandoning it");
        }
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Create the application router with all routes and middleware
fn create_router(state: AppState, feature_state: FeatureState, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
        .nest("/api/v1", features::router(feature_state))
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Response {
    match db::health_check(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
                "time": Utc::now(),
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "disconnected",
                    "time": Utc::now(),
                })),
            )
                .into_response()
        },
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
