//! Concurrent CSV ingestion
//!
//! One reader task decodes the source and feeds a bounded queue; a fixed pool
//! of workers drains it and upserts the customer, product and order of each
//! row, in that order. The first error of the run, whether raised by the
//! reader or a worker, is the one reported; later errors are logged and
//! dropped. Every run ends with exactly one [`RunRecord`] appended to the run
//! log.
//!
//! Rows already written stay written when a run fails.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sales_ingest::{IngestionPipeline, MemoryStore};
//!
//! # async fn example() -> Result<(), sales_ingest::IngestError> {
//! let store = Arc::new(MemoryStore::new());
//! let pipeline = IngestionPipeline::new(store.clone(), store.clone(), 4)?;
//! let record = pipeline.run("data/sales_data.csv").await?;
//! println!("{} rows, status {}", record.rows_loaded, record.status);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use futures::future::join_all;
use tokio::fs::File;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::error::IngestError;
use crate::models::{EntityDocument, RunRecord};
use crate::record::SourceRecord;
use crate::store::{EntityStore, RunLogSink};

/// Cancellation and deadline for a single run
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    /// Cancelling stops the reader; workers finish their current row and exit
    pub cancel: CancellationToken,
    /// Hard ceiling; when it elapses the run is abandoned and logged as failed
    pub timeout: Option<Duration>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn EntityStore>,
    run_log: Arc<dyn RunLogSink>,
    worker_count: usize,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn EntityStore>,
        run_log: Arc<dyn RunLogSink>,
        worker_count: usize,
    ) -> Result<Self, IngestError> {
        if worker_count == 0 {
            return Err(IngestError::InvalidWorkerCount(worker_count));
        }
        Ok(Self {
            store,
            run_log,
            worker_count,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Capacity of the row queue between reader and workers
    pub fn queue_capacity(&self) -> usize {
        self.worker_count * 2
    }

    /// Ingest `source` with no deadline.
    pub async fn run(&self, source: impl AsRef<Path>) -> Result<RunRecord, IngestError> {
        self.run_with(source, RunControl::default()).await
    }

    /// Ingest `source` honoring `control`.
    ///
    /// Returns `Ok` whenever the run record was appended, including for
    /// failed runs; inspect [`RunRecord::status`]. Returns
    /// [`IngestError::RunLog`] when the record itself could not be written.
    pub async fn run_with(
        &self,
        source: impl AsRef<Path>,
        control: RunControl,
    ) -> Result<RunRecord, IngestError> {
        let source = source.as_ref();
        let span = info_span!(
            "ingestion_run",
            source = %source.display(),
            workers = self.worker_count
        );
        self.execute(source, control).instrument(span).await
    }

    async fn execute(&self, source: &Path, control: RunControl) -> Result<RunRecord, IngestError> {
        let start_time = Utc::now();
        let started = Instant::now();
        info!("Starting ingestion run");

        let outcome = self.ingest(source, &control).await;
        let record = match outcome.error {
            None => RunRecord::succeeded(start_time, outcome.rows_read),
            Some(message) => RunRecord::failed(start_time, outcome.rows_read, message),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &record.error_msg {
            None => info!(
                rows = record.rows_loaded,
                status = %record.status,
                elapsed_ms,
                "Ingestion run completed"
            ),
            Some(message) => warn!(
                rows = record.rows_loaded,
                status = %record.status,
                elapsed_ms,
                error = %message,
                "Ingestion run failed"
            ),
        }

        if let Err(source) = self.run_log.append(&record).await {
            error!(run_id = %record.id, error = %source, "Failed to append run log");
            return Err(IngestError::RunLog {
                record: Box::new(record),
                source,
            });
        }

        Ok(record)
    }

    async fn ingest(&self, source: &Path, control: &RunControl) -> Outcome {
        let deadline = Deadline::starting_now(control.timeout);

        // Opening blocks until a FIFO has a writer
        let reader = tokio::select! {
            biased;
            _ = control.cancel.cancelled() => return Outcome::failed(IngestError::Cancelled),
            limit = deadline.elapsed() => {
                warn!(timeout = ?limit, "Ingestion run timed out opening the source");
                return Outcome::failed(IngestError::TimedOut(limit));
            },
            opened = open_source(source) => match opened {
                Ok(reader) => reader,
                Err(e) => return Outcome::failed(e),
            },
        };

        let stop = control.cancel.child_token();
        let failure = Arc::new(FirstFailure::default());
        let rows_read = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::channel(self.queue_capacity());
        let queue = Arc::new(Mutex::new(rx));

        let workers: Vec<_> = (1..=self.worker_count)
            .map(|id| {
                let worker = Worker {
                    id,
                    store: Arc::clone(&self.store),
                    queue: Arc::clone(&queue),
                    failure: Arc::clone(&failure),
                    stop: stop.clone(),
                };
                tokio::spawn(worker.run().in_current_span())
            })
            .collect();
        drop(queue);

        let reader = tokio::spawn(
            read_rows(reader, tx, Arc::clone(&failure), Arc::clone(&rows_read), stop.clone())
                .in_current_span(),
        );

        let drained = async {
            let mut interrupted = false;
            for (index, joined) in join_all(workers).await.into_iter().enumerate() {
                match joined {
                    Ok(exit) => interrupted |= exit == TaskExit::Cancelled,
                    Err(e) => failure.report(panicked(format!("worker {}", index + 1), e)),
                }
            }
            match reader.await {
                Ok(exit) => interrupted |= exit == TaskExit::Cancelled,
                Err(e) => failure.report(panicked("reader".to_string(), e)),
            }
            interrupted
        };

        let interrupted = tokio::select! {
            interrupted = drained => interrupted,
            limit = deadline.elapsed() => {
                // Tasks see the stop signal and wind down on their own;
                // the run does not wait for them.
                stop.cancel();
                warn!(timeout = ?limit, "Ingestion run timed out");
                failure.report(IngestError::TimedOut(limit));
                false
            },
        };

        if interrupted {
            failure.report(IngestError::Cancelled);
        }

        Outcome {
            rows_read: rows_read.load(Ordering::SeqCst),
            error: failure.message(),
        }
    }
}

async fn open_source(source: &Path) -> Result<AsyncReader<File>, IngestError> {
    let file = File::open(source)
        .await
        .map_err(|e| IngestError::SourceAccess {
            path: source.to_path_buf(),
            source: e,
        })?;

    let mut reader = AsyncReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .create_reader(file);

    let mut header = StringRecord::new();
    match reader.read_record(&mut header).await {
        Ok(true) => debug!(columns = header.len(), "Read header"),
        Ok(false) => return Err(IngestError::Header("source is empty".to_string())),
        Err(e) => return Err(IngestError::Header(e.to_string())),
    }
    Ok(reader)
}

/// Hard ceiling of a run, fixed when the run starts
#[derive(Debug, Clone, Copy)]
struct Deadline(Option<(Duration, tokio::time::Instant)>);

impl Deadline {
    fn starting_now(limit: Option<Duration>) -> Self {
        Self(limit.map(|limit| (limit, tokio::time::Instant::now() + limit)))
    }

    /// Resolves to the limit once it has passed; never resolves without one
    async fn elapsed(self) -> Duration {
        match self.0 {
            Some((limit, at)) => {
                tokio::time::sleep_until(at).await;
                limit
            },
            None => std::future::pending().await,
        }
    }
}

struct Outcome {
    rows_read: u64,
    error: Option<String>,
}

impl Outcome {
    fn failed(error: IngestError) -> Self {
        error!(error = %error, "Ingestion aborted before reading rows");
        Self {
            rows_read: 0,
            error: Some(error.to_string()),
        }
    }
}

/// How a reader or worker task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskExit {
    /// Source exhausted (reader) or queue closed and empty (worker)
    Completed,
    Failed,
    Cancelled,
    /// Reader only: every worker had exited
    Abandoned,
}

/// First-write-wins error cell shared by the reader and the workers
#[derive(Default)]
struct FirstFailure(OnceLock<IngestError>);

impl FirstFailure {
    fn report(&self, err: IngestError) {
        if let Err(dropped) = self.0.set(err) {
            debug!(error = %dropped, "Dropping error, run already failed");
        }
    }

    fn message(&self) -> Option<String> {
        self.0.get().map(ToString::to_string)
    }
}

fn panicked(task: String, err: JoinError) -> IngestError {
    IngestError::TaskPanicked {
        task,
        message: err.to_string(),
    }
}

async fn read_rows(
    mut reader: AsyncReader<File>,
    queue: mpsc::Sender<SourceRecord>,
    failure: Arc<FirstFailure>,
    rows_read: Arc<AtomicU64>,
    stop: CancellationToken,
) -> TaskExit {
    let mut fields = StringRecord::new();
    let mut row: u64 = 0;

    loop {
        if stop.is_cancelled() {
            return TaskExit::Cancelled;
        }

        row += 1;
        match reader.read_record(&mut fields).await {
            Ok(true) => {},
            Ok(false) => {
                debug!(rows = row - 1, "Reached end of source");
                return TaskExit::Completed;
            },
            Err(e) => {
                let err = IngestError::SourceFormat {
                    row,
                    reason: e.to_string(),
                };
                error!(error = %err, "Stopping reader");
                failure.report(err);
                return TaskExit::Failed;
            },
        }

        let record = match SourceRecord::from_fields(row, fields.iter()) {
            Ok(record) => record,
            Err(err) => {
                error!(error = %err, "Stopping reader");
                failure.report(err);
                return TaskExit::Failed;
            },
        };

        tokio::select! {
            biased;
            _ = stop.cancelled() => return TaskExit::Cancelled,
            sent = queue.send(record) => {
                if sent.is_err() {
                    debug!(row, "All workers exited, stopping reader");
                    return TaskExit::Abandoned;
                }
            }
        }
        rows_read.fetch_add(1, Ordering::SeqCst);
    }
}

struct Worker {
    id: usize,
    store: Arc<dyn EntityStore>,
    queue: Arc<Mutex<mpsc::Receiver<SourceRecord>>>,
    failure: Arc<FirstFailure>,
    stop: CancellationToken,
}

impl Worker {
    async fn run(self) -> TaskExit {
        debug!(worker = self.id, "Worker started");
        let mut processed: u64 = 0;

        let exit = loop {
            let next = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break TaskExit::Cancelled,
                next = async { self.queue.lock().await.recv().await } => next,
            };
            let Some(record) = next else {
                break TaskExit::Completed;
            };

            if let Err(err) = process_record(self.store.as_ref(), &record).await {
                error!(worker = self.id, order_id = %record.order_id, error = %err, "Worker stopping");
                self.failure.report(err);
                break TaskExit::Failed;
            }
            processed += 1;
        };

        debug!(worker = self.id, processed, exit = ?exit, "Worker exited");
        exit
    }
}

/// Upsert customer, then product, then order. Stops at the first failure;
/// a bad sale date leaves the customer and product written.
async fn process_record(store: &dyn EntityStore, record: &SourceRecord) -> Result<(), IngestError> {
    upsert(store, record.customer().into()).await?;
    upsert(store, record.product().into()).await?;
    upsert(store, record.order()?.into()).await?;
    Ok(())
}

async fn upsert(store: &dyn EntityStore, document: EntityDocument) -> Result<(), IngestError> {
    let kind = document.kind();
    let key = document.key().to_string();
    match store.upsert_if_absent(document).await {
        Ok(inserted) => {
            trace!(%kind, key, inserted, "Upserted");
            Ok(())
        },
        Err(source) => Err(IngestError::Persistence { kind, key, source }),
    }
}
