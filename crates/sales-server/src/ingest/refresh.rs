//! The unit of work a scheduler fire performs

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sales_ingest::{IngestError, IngestionPipeline, RunControl, RunRecord};

/// Something the scheduler can run on each fire
#[async_trait]
pub trait RefreshTask: Send + Sync {
    async fn refresh(&self, control: RunControl) -> Result<RunRecord, IngestError>;
}

/// Reloads the configured CSV file through the ingestion pipeline
#[derive(Clone)]
pub struct CsvRefresh {
    pipeline: IngestionPipeline,
    source_path: PathBuf,
}

impl CsvRefresh {
    pub fn new(pipeline: IngestionPipeline, source_path: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            source_path: source_path.into(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

#[async_trait]
impl RefreshTask for CsvRefresh {
    async fn refresh(&self, control: RunControl) -> Result<RunRecord, IngestError> {
        self.pipeline.run_with(&self.source_path, control).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use sales_ingest::{MemoryStore, RunStatus};

    #[tokio::test]
    async fn test_csv_refresh_runs_pipeline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header").unwrap();
        writeln!(
            file,
            "O1,P1,C1,Widget,Tools,North,2024-01-05,2,10.0,0.1,5.0,Card,Ada,ada@example.com,1 Loop Rd"
        )
        .unwrap();

        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(store.clone(), store.clone(), 2).unwrap();
        let task = CsvRefresh::new(pipeline, file.path());

        let record = task.refresh(RunControl::default()).await.unwrap();

        assert_eq!(task.source_path(), file.path());
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(store.counts().orders, 1);
    }
}
