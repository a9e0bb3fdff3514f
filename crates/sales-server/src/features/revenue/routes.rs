//! Revenue routes
//!
//! All endpoints take `start_date` and `end_date` (`YYYY-MM-DD`, inclusive):
//!
//! - `GET /api/v1/revenue/total`
//! - `GET /api/v1/revenue/product`
//! - `GET /api/v1/revenue/category`
//! - `GET /api/v1/revenue/region`

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use sales_ingest::record::DATE_FORMAT;
use sales_ingest::{DateRange, SalesAnalytics, StoreResult};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;

/// Ceiling for a single revenue query
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Deserialize)]
pub struct RevenueQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl RevenueQuery {
    fn range(&self) -> Result<DateRange, AppError> {
        Ok(DateRange::parse(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
        )?)
    }
}

/// Create revenue routes
pub fn revenue_routes() -> Router<Arc<dyn SalesAnalytics>> {
    Router::new()
        .route("/total", get(total_revenue))
        .route("/product", get(revenue_by_product))
        .route("/category", get(revenue_by_category))
        .route("/region", get(revenue_by_region))
}

#[tracing::instrument(skip(analytics))]
async fn total_revenue(
    State(analytics): State<Arc<dyn SalesAnalytics>>,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<Value>, AppError> {
    let range = query.range()?;
    let total = bounded("total revenue", analytics.total_revenue(range)).await?;
    Ok(Json(with_range(range, "total_revenue", json!(total))))
}

#[tracing::instrument(skip(analytics))]
async fn revenue_by_product(
    State(analytics): State<Arc<dyn SalesAnalytics>>,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<Value>, AppError> {
    let range = query.range()?;
    let rows = bounded("revenue by product", analytics.revenue_by_product(range)).await?;
    Ok(Json(with_range(range, "products_revenue", json!(rows))))
}

#[tracing::instrument(skip(analytics))]
async fn revenue_by_category(
    State(analytics): State<Arc<dyn SalesAnalytics>>,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<Value>, AppError> {
    let range = query.range()?;
    let rows = bounded("revenue by category", analytics.revenue_by_category(range)).await?;
    Ok(Json(with_range(range, "categories_revenue", json!(rows))))
}

#[tracing::instrument(skip(analytics))]
async fn revenue_by_region(
    State(analytics): State<Arc<dyn SalesAnalytics>>,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<Value>, AppError> {
    let range = query.range()?;
    let rows = bounded("revenue by region", analytics.revenue_by_region(range)).await?;
    Ok(Json(with_range(range, "regions_revenue", json!(rows))))
}

async fn bounded<T>(
    what: &str,
    query: impl Future<Output = StoreResult<T>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(QUERY_TIMEOUT, query).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AppError::Internal(format!(
            "Failed to calculate {what}: query timed out"
        ))),
    }
}

fn with_range(range: DateRange, key: &str, value: Value) -> Value {
    let mut body = json!({
        "start_date": range.start.format(DATE_FORMAT).to_string(),
        "end_date": range.end.format(DATE_FORMAT).to_string(),
    });
    body[key] = value;
    body
}
