//! PostgreSQL-backed entity store, run log and revenue queries

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sales_ingest::analytics::{CategoryRevenue, ProductRevenue, RegionRevenue};
use sales_ingest::{
    DateRange, EntityDocument, EntityStore, RunLogSink, RunRecord, RunStatus, SalesAnalytics,
    StoreError, StoreResult,
};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

/// Revenue of one order line joined to its product
const LINE_REVENUE: &str = "o.quantity_sold * (p.unit_price - p.unit_price * p.discount)";

#[derive(Debug, Clone)]
pub struct PgSalesStore {
    pool: PgPool,
}

impl PgSalesStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        },
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl EntityStore for PgSalesStore {
    async fn upsert_if_absent(&self, document: EntityDocument) -> StoreResult<bool> {
        let result = match &document {
            EntityDocument::Customer(c) => {
                sqlx::query(
                    r#"
                    INSERT INTO customers (customer_id, name, email, address)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (customer_id) DO NOTHING
                    "#,
                )
                .bind(&c.customer_id)
                .bind(&c.name)
                .bind(&c.email)
                .bind(&c.address)
                .execute(&self.pool)
                .await
            },
            EntityDocument::Product(p) => {
                sqlx::query(
                    r#"
                    INSERT INTO products (product_id, name, category, unit_price, discount)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (product_id) DO NOTHING
                    "#,
                )
                .bind(&p.product_id)
                .bind(&p.name)
                .bind(&p.category)
                .bind(p.unit_price)
                .bind(p.discount)
                .execute(&self.pool)
                .await
            },
            EntityDocument::Order(o) => {
                sqlx::query(
                    r#"
                    INSERT INTO orders (
                        order_id, product_id, customer_id, region, date_of_sale,
                        quantity_sold, shipping_cost, payment_method
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (order_id) DO NOTHING
                    "#,
                )
                .bind(&o.order_id)
                .bind(&o.product_id)
                .bind(&o.customer_id)
                .bind(&o.region)
                .bind(o.date_of_sale)
                .bind(o.quantity_sold)
                .bind(o.shipping_cost)
                .bind(&o.payment_method)
                .execute(&self.pool)
                .await
            },
        }
        .map_err(store_error)?;

        let inserted = result.rows_affected() == 1;
        debug!(
            kind = %document.kind(),
            key = document.key(),
            inserted,
            "Upserted document"
        );
        Ok(inserted)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RunLogRow {
    id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    rows_loaded: i64,
    error_msg: Option<String>,
}

impl TryFrom<RunLogRow> for RunRecord {
    type Error = StoreError;

    fn try_from(row: RunLogRow) -> Result<Self, Self::Error> {
        let status: RunStatus = row.status.parse().map_err(StoreError::Backend)?;
        let rows_loaded = u64::try_from(row.rows_loaded).map_err(|_| {
            StoreError::Backend(format!("negative rows_loaded in run {}", row.id))
        })?;
        Ok(RunRecord {
            id: row.id,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            rows_loaded,
            error_msg: row.error_msg,
        })
    }
}

#[async_trait]
impl RunLogSink for PgSalesStore {
    async fn append(&self, record: &RunRecord) -> StoreResult<()> {
        let rows_loaded = i64::try_from(record.rows_loaded).unwrap_or(i64::MAX);
        sqlx::query(
            r#"
            INSERT INTO refresh_logs (id, start_time, end_time, status, rows_loaded, error_msg)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(record.status.as_str())
        .bind(rows_loaded)
        .bind(&record.error_msg)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        debug!(run_id = %record.id, status = %record.status, "Appended run record");
        Ok(())
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<RunRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, RunLogRow>(
            r#"
            SELECT id, start_time, end_time, status, rows_loaded, error_msg
            FROM refresh_logs
            ORDER BY start_time DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(RunRecord::try_from).collect()
    }
}

#[async_trait]
impl SalesAnalytics for PgSalesStore {
    async fn total_revenue(&self, range: DateRange) -> StoreResult<f64> {
        let sql = format!(
            r#"
            SELECT COALESCE(SUM({LINE_REVENUE}), 0)::DOUBLE PRECISION
            FROM orders o
            JOIN products p ON p.product_id = o.product_id
            WHERE o.date_of_sale BETWEEN $1 AND $2
            "#
        );
        sqlx::query_scalar::<_, f64>(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn revenue_by_product(&self, range: DateRange) -> StoreResult<Vec<ProductRevenue>> {
        let sql = format!(
            r#"
            SELECT p.product_id, p.name, SUM({LINE_REVENUE})::DOUBLE PRECISION AS total_revenue
            FROM orders o
            JOIN products p ON p.product_id = o.product_id
            WHERE o.date_of_sale BETWEEN $1 AND $2
            GROUP BY p.product_id, p.name
            ORDER BY total_revenue DESC
            "#
        );
        let rows = sqlx::query_as::<_, (String, String, f64)>(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .map(|(product_id, product_name, total_revenue)| ProductRevenue {
                product_id,
                product_name,
                total_revenue,
            })
            .collect())
    }

    async fn revenue_by_category(&self, range: DateRange) -> StoreResult<Vec<CategoryRevenue>> {
        let rows = grouped_revenue(&self.pool, "p.category", range).await?;
        Ok(rows
            .into_iter()
            .map(|(category, total_revenue)| CategoryRevenue {
                category,
                total_revenue,
            })
            .collect())
    }

    async fn revenue_by_region(&self, range: DateRange) -> StoreResult<Vec<RegionRevenue>> {
        let rows = grouped_revenue(&self.pool, "o.region", range).await?;
        Ok(rows
            .into_iter()
            .map(|(region, total_revenue)| RegionRevenue {
                region,
                total_revenue,
            })
            .collect())
    }
}

/// Revenue summed per value of `column`, highest first. `column` is one of
/// the fixed expressions above, never caller input.
async fn grouped_revenue(
    pool: &PgPool,
    column: &'static str,
    range: DateRange,
) -> StoreResult<Vec<(String, f64)>> {
    let sql = format!(
        r#"
        SELECT {column}, SUM({LINE_REVENUE})::DOUBLE PRECISION AS total_revenue
        FROM orders o
        JOIN products p ON p.product_id = o.product_id
        WHERE o.date_of_sale BETWEEN $1 AND $2
        GROUP BY {column}
        ORDER BY total_revenue DESC
        "#
    );
    sqlx::query_as::<_, (String, f64)>(&sql)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(pool)
        .await
        .map_err(store_error)
}
