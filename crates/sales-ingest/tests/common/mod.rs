//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use sales_ingest::{
    EntityDocument, EntityKind, EntityStore, MemoryStore, RunLogSink, RunRecord, StoreError,
    StoreResult,
};
use tempfile::NamedTempFile;

pub const HEADER: &str = "Order ID,Product ID,Customer ID,Product Name,Category,Region,\
Date of Sale,Quantity Sold,Unit Price,Discount,Shipping Cost,Payment Method,\
Customer Name,Customer Email,Customer Address";

/// A well-formed data row
pub fn row(order_id: &str, product_id: &str, customer_id: &str) -> String {
    format!(
        "{order_id},{product_id},{customer_id},Widget {product_id},Tools,North,2024-01-05,2,10.0,0.1,5.0,Card,\
Customer {customer_id},{customer_id}@example.com,\"1 Loop Rd, Springfield\""
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

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Store that fails every upsert of one entity
pub struct FailingStore {
    pub inner: Arc<MemoryStore>,
    pub kind: EntityKind,
    pub key: String,
}

#[async_trait]
impl EntityStore for FailingStore {
    async fn upsert_if_absent(&self, document: EntityDocument) -> StoreResult<bool> {
        if document.kind() == self.kind && document.key() == self.key {
            return Err(StoreError::Backend("constraint violated".to_string()));
        }
        self.inner.upsert_if_absent(document).await
    }
}

/// Store whose upserts never complete
pub struct StalledStore;

#[async_trait]
impl EntityStore for StalledStore {
    async fn upsert_if_absent(&self, _document: EntityDocument) -> StoreResult<bool> {
        std::future::pending().await
    }
}

/// Run log that rejects every append
pub struct UnavailableLog;

#[async_trait]
impl RunLogSink for UnavailableLog {
    async fn append(&self, _record: &RunRecord) -> StoreResult<()> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn recent(&self, _limit: usize) -> StoreResult<Vec<RunRecord>> {
        Ok(Vec::new())
    }
}
