//! Revenue projections over ingested orders
//!
//! Revenue of one order line is `quantity_sold * (unit_price - unit_price * discount)`,
//! using the product as stored. Orders whose product is missing are ignored.
//! Date ranges are inclusive on both ends.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StoreResult;
use crate::models::{Order, Product};
use crate::record::parse_sale_date;
use crate::store::MemoryStore;

/// Rejected `start_date` / `end_date` input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("start_date and end_date are required")]
    Missing,

    #[error("invalid start_date format, use YYYY-MM-DD")]
    InvalidStart,

    #[error("invalid end_date format, use YYYY-MM-DD")]
    InvalidEnd,

    #[error("end_date must not be before start_date")]
    Reversed,
}

/// Inclusive range of sale dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if end < start {
            return Err(DateRangeError::Reversed);
        }
        Ok(Self { start, end })
    }

    /// Parse query parameters. Empty strings count as missing.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, DateRangeError> {
        let (Some(start), Some(end)) = (
            start.filter(|s| !s.is_empty()),
            end.filter(|s| !s.is_empty()),
        ) else {
            return Err(DateRangeError::Missing);
        };

        let start = parse_sale_date(start).map_err(|_| DateRangeError::InvalidStart)?;
        let end = parse_sale_date(end).map_err(|_| DateRangeError::InvalidEnd)?;
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRevenue {
    pub product_id: String,
    pub product_name: String,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRevenue {
    pub category: String,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRevenue {
    pub region: String,
    pub total_revenue: f64,
}

/// Read-only revenue queries. Grouped results are sorted by revenue,
/// highest first.
#[async_trait]
pub trait SalesAnalytics: Send + Sync {
    async fn total_revenue(&self, range: DateRange) -> StoreResult<f64>;

    async fn revenue_by_product(&self, range: DateRange) -> StoreResult<Vec<ProductRevenue>>;

    async fn revenue_by_category(&self, range: DateRange) -> StoreResult<Vec<CategoryRevenue>>;

    async fn revenue_by_region(&self, range: DateRange) -> StoreResult<Vec<RegionRevenue>>;
}

/// Revenue of a single order line
pub fn line_revenue(quantity_sold: i64, product: &Product) -> f64 {
    quantity_sold as f64 * (product.unit_price - product.unit_price * product.discount)
}

#[async_trait]
impl SalesAnalytics for MemoryStore {
    async fn total_revenue(&self, range: DateRange) -> StoreResult<f64> {
        Ok(lines_in(self, range)
            .map(|(order, product)| line_revenue(order.quantity_sold, &product))
            .sum())
    }

    async fn revenue_by_product(&self, range: DateRange) -> StoreResult<Vec<ProductRevenue>> {
        let mut names: BTreeMap<String, String> = BTreeMap::new();
        let totals = group_revenue(self, range, |_, product| {
            names
                .entry(product.product_id.clone())
                .or_insert_with(|| product.name.clone());
            product.product_id.clone()
        });

        Ok(sorted_by_revenue(totals, |product_id, total_revenue| ProductRevenue {
            product_name: names.get(&product_id).cloned().unwrap_or_default(),
            product_id,
            total_revenue,
        }))
    }

    async fn revenue_by_category(&self, range: DateRange) -> StoreResult<Vec<CategoryRevenue>> {
        let totals = group_revenue(self, range, |_, product| product.category.clone());
        Ok(sorted_by_revenue(totals, |category, total_revenue| CategoryRevenue {
            category,
            total_revenue,
        }))
    }

    async fn revenue_by_region(&self, range: DateRange) -> StoreResult<Vec<RegionRevenue>> {
        let totals = group_revenue(self, range, |order, _| order.region.clone());
        Ok(sorted_by_revenue(totals, |region, total_revenue| RegionRevenue {
            region,
            total_revenue,
        }))
    }
}

fn lines_in(store: &MemoryStore, range: DateRange) -> impl Iterator<Item = (Order, Product)> {
    store
        .order_lines()
        .into_iter()
        .filter(move |(order, _)| range.contains(order.date_of_sale))
}

fn group_revenue(
    store: &MemoryStore,
    range: DateRange,
    mut group: impl FnMut(&Order, &Product) -> String,
) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for (order, product) in lines_in(store, range) {
        *totals.entry(group(&order, &product)).or_insert(0.0) +=
            line_revenue(order.quantity_sold, &product);
    }
    totals
}

// Ties keep key order: the map iterates sorted and the sort is stable.
fn sorted_by_revenue<T>(
    totals: BTreeMap<String, f64>,
    mut build: impl FnMut(String, f64) -> T,
) -> Vec<T> {
    let mut totals: Vec<(String, f64)> = totals.into_iter().collect();
    totals.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    totals.into_iter().map(|(key, total)| build(key, total)).collect()
}
