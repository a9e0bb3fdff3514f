//! Persistence seams used by the ingestion pipeline
//!
//! [`EntityStore`] receives insert-if-absent upserts for customers, products
//! and orders. [`RunLogSink`] records one [`RunRecord`] per run.
//! [`MemoryStore`] implements both and backs the CLI and the test suites.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{Customer, EntityDocument, Order, Product, RunRecord};

/// Keyed document store with insert-if-absent semantics
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert the document unless one with the same kind and key exists.
    ///
    /// Returns `true` when the document was inserted. An existing document
    /// is never modified.
    async fn upsert_if_absent(&self, document: EntityDocument) -> StoreResult<bool>;
}

/// Append-only log of ingestion runs
#[async_trait]
pub trait RunLogSink: Send + Sync {
    async fn append(&self, record: &RunRecord) -> StoreResult<()>;

    /// Up to `limit` records, most recent start time first
    async fn recent(&self, limit: usize) -> StoreResult<Vec<RunRecord>>;
}

/// Row counts per collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub customers: usize,
    pub products: usize,
    pub orders: usize,
    pub runs: usize,
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    customers: RwLock<HashMap<String, Customer>>,
    products: RwLock<HashMap<String, Product>>,
    orders: RwLock<HashMap<String, Order>>,
    runs: RwLock<Vec<RunRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customer(&self, customer_id: &str) -> Option<Customer> {
        read(&self.customers).get(customer_id).cloned()
    }

    pub fn product(&self, product_id: &str) -> Option<Product> {
        read(&self.products).get(product_id).cloned()
    }

    pub fn order(&self, order_id: &str) -> Option<Order> {
        read(&self.orders).get(order_id).cloned()
    }

    pub fn customers(&self) -> Vec<Customer> {
        sorted_values(&self.customers, |c| c.customer_id.clone())
    }

    pub fn products(&self) -> Vec<Product> {
        sorted_values(&self.products, |p| p.product_id.clone())
    }

    pub fn orders(&self) -> Vec<Order> {
        sorted_values(&self.orders, |o| o.order_id.clone())
    }

    /// Every run record in append order
    pub fn runs(&self) -> Vec<RunRecord> {
        read(&self.runs).clone()
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            customers: read(&self.customers).len(),
            products: read(&self.products).len(),
            orders: read(&self.orders).len(),
            runs: read(&self.runs).len(),
        }
    }

    /// Orders joined to their products. Orders whose product is missing are
    /// left out.
    pub(crate) fn order_lines(&self) -> Vec<(Order, Product)> {
        let orders = read(&self.orders);
        let products = read(&self.products);
        orders
            .values()
            .filter_map(|order| {
                products
                    .get(&order.product_id)
                    .map(|product| (order.clone(), product.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn upsert_if_absent(&self, document: EntityDocument) -> StoreResult<bool> {
        let inserted = match document {
            EntityDocument::Customer(c) => insert_if_absent(&self.customers, c.customer_id.clone(), c),
            EntityDocument::Product(p) => insert_if_absent(&self.products, p.product_id.clone(), p),
            EntityDocument::Order(o) => insert_if_absent(&self.orders, o.order_id.clone(), o),
        };
        Ok(inserted)
    }
}

#[async_trait]
impl RunLogSink for MemoryStore {
    async fn append(&self, record: &RunRecord) -> StoreResult<()> {
        write(&self.runs).push(record.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<RunRecord>> {
        let mut runs = read(&self.runs).clone();
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        runs.truncate(limit);
        Ok(runs)
    }
}

// A panic while holding one of these locks cannot leave a map half-written,
// so poisoned guards are used as-is.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn insert_if_absent<T>(map: &RwLock<HashMap<String, T>>, key: String, value: T) -> bool {
    match write(map).entry(key) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(value);
            true
        },
    }
}

fn sorted_values<T: Clone>(map: &RwLock<HashMap<String, T>>, key: impl Fn(&T) -> String) -> Vec<T> {
    let mut values: Vec<T> = read(map).values().cloned().collect();
    values.sort_by_key(key);
    values
}
