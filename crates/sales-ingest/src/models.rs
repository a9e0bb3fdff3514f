//! Persisted entities and run log records

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer, identified by `customer_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub name: String,
    pub email: String,
    pub address: String,
}

/// A product, identified by `product_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub unit_price: f64,
    /// Fraction of the unit price taken off, 0.0 to 1.0
    pub discount: f64,
}

/// An order line, identified by `order_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub product_id: String,
    pub customer_id: String,
    pub region: String,
    pub date_of_sale: NaiveDate,
    pub quantity_sold: i64,
    pub shipping_cost: f64,
    pub payment_method: String,
}

/// The three entity collections written by ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Customer,
    Product,
    Order,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customer => "customer",
            EntityKind::Product => "product",
            EntityKind::Order => "order",
        }
    }

    /// Collection (table) name for this entity
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Customer => "customers",
            EntityKind::Product => "products",
            EntityKind::Order => "orders",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document handed to [`crate::store::EntityStore::upsert_if_absent`]
#[derive(Debug, Clone, PartialEq)]
pub enum EntityDocument {
    Customer(Customer),
    Product(Product),
    Order(Order),
}

impl EntityDocument {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityDocument::Customer(_) => EntityKind::Customer,
            EntityDocument::Product(_) => EntityKind::Product,
            EntityDocument::Order(_) => EntityKind::Order,
        }
    }

    /// Identity of the document within its collection
    pub fn key(&self) -> &str {
        match self {
            EntityDocument::Customer(c) => &c.customer_id,
            EntityDocument::Product(p) => &p.product_id,
            EntityDocument::Order(o) => &o.order_id,
        }
    }
}

impl From<Customer> for EntityDocument {
    fn from(customer: Customer) -> Self {
        EntityDocument::Customer(customer)
    }
}

impl From<Product> for EntityDocument {
    fn from(product: Product) -> Self {
        EntityDocument::Product(product)
    }
}

impl From<Order> for EntityDocument {
    fn from(order: Order) -> Self {
        EntityDocument::Order(order)
    }
}

/// Outcome of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// One entry in the run log, written once per ingestion attempt
///
/// `rows_loaded` counts rows read from the source, not rows inserted.
/// `error_msg` is present exactly when `status` is [`RunStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: RunStatus,
    pub rows_loaded: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl RunRecord {
    pub fn succeeded(start_time: DateTime<Utc>, rows_loaded: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time: Utc::now(),
            status: RunStatus::Success,
            rows_loaded,
            error_msg: None,
        }
    }

    pub fn failed(start_time: DateTime<Utc>, rows_loaded: u64, error: impl fmt::Display) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time: Utc::now(),
            status: RunStatus::Failed,
            rows_loaded,
            error_msg: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}
