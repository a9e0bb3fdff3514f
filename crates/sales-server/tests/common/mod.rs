//! Common test utilities for sales server integration tests
//!
//! - Refresh tasks with controllable timing for scheduler tests
//! - CSV fixtures and an in-memory router for API tests
//! - A PostgreSQL container with the schema applied (Docker required)

#![allow(dead_code)]

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use chrono::Utc;
use http_body_util::BodyExt;
use sales_ingest::{IngestError, IngestionPipeline, MemoryStore, RunControl, RunRecord};
use sales_server::features::{self, FeatureState, RefreshSettings};
use sales_server::ingest::{CsvRefresh, RefreshScheduler, RefreshTask, SchedulerState};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tempfile::NamedTempFile;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::Semaphore;
use tower::ServiceExt;

// ============================================================================
// Refresh tasks
// ============================================================================

/// Task whose runs block until [`GatedTask::release`] is called
pub struct GatedTask {
    gate: Semaphore,
    started: AtomicUsize,
    finished: AtomicUsize,
    controls: Mutex<Vec<RunControl>>,
}

impl GatedTask {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            controls: Mutex::new(Vec::new()),
        })
    }

    /// Let one blocked run finish
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Deadline handed to each run, in start order
    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.controls
            .lock()
            .unwrap()
            .iter()
            .map(|control| control.timeout)
            .collect()
    }
}

#[async_trait]
impl RefreshTask for GatedTask {
    async fn refresh(&self, control: RunControl) -> Result<RunRecord, IngestError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.controls.lock().unwrap().push(control);
        self.gate.acquire().await.unwrap().forget();
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(RunRecord::succeeded(Utc::now(), 0))
    }
}

/// Task that finishes immediately
#[derive(Default)]
pub struct CountingTask {
    runs: AtomicUsize,
}

impl CountingTask {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshTask for CountingTask {
    async fn refresh(&self, _control: RunControl) -> Result<RunRecord, IngestError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(RunRecord::succeeded(Utc::now(), 0))
    }
}

/// Task that ignores its deadline and never finishes on its own
#[derive(Default)]
pub struct StuckTask {
    controls: Mutex<Vec<RunControl>>,
}

impl StuckTask {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether the stop signal of the most recent run was raised
    pub fn last_cancelled(&self) -> bool {
        self.controls
            .lock()
            .unwrap()
            .last()
            .is_some_and(|control| control.cancel.is_cancelled())
    }
}

#[async_trait]
impl RefreshTask for StuckTask {
    async fn refresh(&self, control: RunControl) -> Result<RunRecord, IngestError> {
        self.controls.lock().unwrap().push(control);
        std::future::pending().await
    }
}

/// Task that runs until its stop signal is raised, then records a failed run
#[derive(Default)]
pub struct CancelAwareTask {
    finished: AtomicUsize,
}

impl CancelAwareTask {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshTask for CancelAwareTask {
    async fn refresh(&self, control: RunControl) -> Result<RunRecord, IngestError> {
        control.cancel.cancelled().await;
        // Winding down takes a moment, as workers finish their current row
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(RunRecord::failed(Utc::now(), 0, "ingestion cancelled"))
    }
}

/// Poll until no run is in flight
pub async fn wait_until_not_running(scheduler: &RefreshScheduler) {
    for _ in 0..500 {
        if scheduler.state() != SchedulerState::Running {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("refresh run did not finish");
}

// ============================================================================
// CSV fixtures
// ============================================================================

pub const HEADER: &str = "Order ID,Product ID,Customer ID,Product Name,Category,Region,\
Date of Sale,Quantity Sold,Unit Price,Discount,Shipping Cost,Payment Method,\
Customer Name,Customer Email,Customer Address";

/// One order line; the product's price and discount come from the arguments
#[allow(clippy::too_many_arguments)]
pub fn sale(
    order_id: &str,
    product_id: &str,
    category: &str,
    region: &str,
    date: &str,
    quantity: u32,
    unit_price: f64,
    discount: f64,
) -> String {
    format!(
        "{order_id},{product_id},C1,Product {product_id},{category},{region},{date},\
{quantity},{unit_price},{discount},4.5,Card,Ada,ada@example.com,\"1 Loop Rd, Springfield\""
    )
}

/// Write a CSV file with the standard header followed by `rows`
pub fn csv_file(rows: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}

/// Sales used by the revenue tests
///
/// | order | product | category    | region | date       | revenue |
/// |-------|---------|-------------|--------|------------|---------|
/// | O1    | P1      | Electronics | North  | 2024-01-10 | 180     |
/// | O2    | P1      | Electronics | South  | 2024-02-15 | 90      |
/// | O3    | P2      | Books       | South  | 2024-02-20 | 60      |
/// | O4    | P3      | Books       | North  | 2024-06-01 | 25      |
pub fn sample_sales() -> Vec<String> {
    vec![
        sale("O1", "P1", "Electronics", "North", "2024-01-10", 2, 100.0, 0.1),
        sale("O2", "P1", "Electronics", "South", "2024-02-15", 1, 100.0, 0.1),
        sale("O3", "P2", "Books", "South", "2024-02-20", 3, 20.0, 0.0),
        sale("O4", "P3", "Books", "North", "2024-06-01", 1, 50.0, 0.5),
    ]
}

// ============================================================================
// API harness
// ============================================================================

/// Router over an in-memory store, refreshing from `csv`
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub scheduler: RefreshScheduler,
    pub csv: NamedTempFile,
}

impl TestApp {
    pub fn new(rows: &[String]) -> Self {
        let csv = csv_file(rows);
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(store.clone(), store.clone(), 2).unwrap();
        let task = Arc::new(CsvRefresh::new(pipeline, csv.path()));
        let scheduler = RefreshScheduler::new(task, Duration::from_secs(60));

        let state = FeatureState {
            scheduler: scheduler.clone(),
            run_log: store.clone(),
            analytics: store.clone(),
            settings: RefreshSettings {
                manual_timeout: Duration::from_secs(30),
                log_limit: 10,
            },
        };
        let router = Router::new().nest("/api/v1", features::router(state));

        Self {
            router,
            store,
            scheduler,
            csv,
        }
    }

    /// Load the CSV directly, bypassing the scheduler
    pub async fn load(&self) {
        let pipeline = IngestionPipeline::new(self.store.clone(), self.store.clone(), 2).unwrap();
        let record = pipeline.run(self.csv.path()).await.unwrap();
        assert!(record.is_success(), "fixture load failed: {:?}", record.error_msg);
    }

    pub async fn send(&self, request: Request<Body>) -> (axum::http::StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (axum::http::StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (axum::http::StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> (axum::http::StatusCode, Value) {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with the schema applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string = format!("postgresql://postgres:postgres@{host}:{port}/postgres");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
