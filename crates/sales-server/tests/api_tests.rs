//! HTTP API tests against an in-memory store

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{sample_sales, TestApp};
use serde_json::{json, Value};

/// Poll the run log until it holds `count` records
async fn wait_for_logs(app: &TestApp, count: usize) -> Vec<Value> {
    for _ in 0..250 {
        let (status, body) = app.get("/api/v1/data/refresh/logs").await;
        assert_eq!(status, StatusCode::OK);
        let logs = body["logs"].as_array().cloned().unwrap_or_default();
        if logs.len() >= count {
            return logs;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("run log never reached {count} records");
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test]
async fn test_refresh_is_accepted_and_logged() {
    let app = TestApp::new(&sample_sales());

    let (status, body) = app.post_json("/api/v1/data/refresh", json!({})).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "processing");
    assert_eq!(body["message"], "Data refresh initiated");

    let logs = wait_for_logs(&app, 1).await;
    assert_eq!(logs[0]["status"], "success");
    assert_eq!(logs[0]["rows_loaded"], 4);
    assert!(logs[0].get("error_msg").is_none());

    let counts = app.store.counts();
    assert_eq!((counts.customers, counts.products, counts.orders), (1, 3, 4));
}

#[tokio::test]
async fn test_refresh_of_missing_file_is_still_accepted() {
    let app = TestApp::new(&[]);
    let path = app.csv.path().to_path_buf();
    std::fs::remove_file(&path).unwrap();

    let (status, _) = app.post_json("/api/v1/data/refresh", json!({})).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let logs = wait_for_logs(&app, 1).await;
    assert_eq!(logs[0]["status"], "failed");
    assert_eq!(logs[0]["rows_loaded"], 0);
    assert!(logs[0]["error_msg"]
        .as_str()
        .unwrap()
        .starts_with("failed to open file"));
}

#[tokio::test]
async fn test_logs_are_newest_first_and_limited() {
    let app = TestApp::new(&sample_sales());
    for _ in 0..3 {
        app.load().await;
    }

    let (status, body) = app.get("/api/v1/data/refresh/logs?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 2);
    let start = |log: &Value| {
        chrono::DateTime::parse_from_rfc3339(log["start_time"].as_str().unwrap()).unwrap()
    };
    assert!(start(&logs[0]) >= start(&logs[1]));

    let (status, body) = app.get("/api/v1/data/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logs"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_empty_run_log() {
    let app = TestApp::new(&sample_sales());

    let (status, body) = app.get("/api/v1/data/refresh/logs").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "logs": [] }));
}

// ============================================================================
// Cron
// ============================================================================

#[tokio::test]
async fn test_cron_create_returns_job_status() {
    let app = TestApp::new(&sample_sales());

    let (status, body) = app
        .post_json("/api/v1/cron/create", json!({ "interval": "1h" }))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body["message"],
        "Cron job created successfully (replaced existing if any)"
    );
    assert_eq!(body["interval"], "1h");
    assert_eq!(body["status"]["active"], true);
    assert_eq!(body["status"]["job_id"], 1);
    assert!(body["status"]["next_run"].is_string());
    assert!(body["status"].get("previous_run").is_none());
}

#[tokio::test]
async fn test_cron_create_replaces_existing_job() {
    let app = TestApp::new(&sample_sales());
    app.post_json("/api/v1/cron/create", json!({ "interval": "1h" }))
        .await;

    let (status, body) = app
        .post_json("/api/v1/cron/create", json!({ "interval": "30m" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"]["job_id"], 2);

    let (_, body) = app.get("/api/v1/cron/status").await;
    assert_eq!(body["job_id"], 2);
    assert_eq!(body["interval"], "30m");
}

#[tokio::test]
async fn test_cron_create_requires_interval() {
    let app = TestApp::new(&sample_sales());

    let (status, body) = app.post_json("/api/v1/cron/create", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "interval is required (e.g., '1h', '30m', '24h')"
    );
    assert_eq!(body["error"]["status"], 400);
}

#[tokio::test]
async fn test_cron_create_rejects_bad_interval() {
    let app = TestApp::new(&sample_sales());

    let (status, body) = app
        .post_json("/api/v1/cron/create", json!({ "interval": "soon" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("invalid interval \"soon\""));
    assert!(!app.scheduler.status().active);
}

#[tokio::test]
async fn test_cron_create_rejects_malformed_body() {
    let app = TestApp::new(&sample_sales());

    let (status, body) = app
        .send(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/v1/cron/create")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["status"], 400);
}

#[tokio::test]
async fn test_cron_delete() {
    let app = TestApp::new(&sample_sales());

    let (status, body) = app.delete("/api/v1/cron/delete").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "no active cron job to delete");

    app.post_json("/api/v1/cron/create", json!({ "interval": "1h" }))
        .await;
    let (status, body) = app.delete("/api/v1/cron/delete").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Cron job deleted successfully");

    let (_, body) = app.get("/api/v1/cron/status").await;
    assert_eq!(body["active"], false);
}

#[tokio::test]
async fn test_cron_status_without_job() {
    let app = TestApp::new(&sample_sales());

    let (status, body) = app.get("/api/v1/cron/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "active": false, "job_id": 0, "running": false }));
}

#[tokio::test]
async fn test_refresh_after_shutdown_is_an_error() {
    let app = TestApp::new(&sample_sales());
    app.scheduler.shutdown().await;

    let (status, body) = app.post_json("/api/v1/data/refresh", json!({})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["message"], "scheduler is shut down");

    let (status, _) = app
        .post_json("/api/v1/cron/create", json!({ "interval": "1h" }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// ============================================================================
// Revenue
// ============================================================================

const Q1: &str = "start_date=2024-01-01&end_date=2024-03-31";

#[tokio::test]
async fn test_total_revenue() {
    let app = TestApp::new(&sample_sales());
    app.load().await;

    let (status, body) = app.get(&format!("/api/v1/revenue/total?{Q1}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start_date"], "2024-01-01");
    assert_eq!(body["end_date"], "2024-03-31");
    assert_eq!(body["total_revenue"].as_f64().unwrap(), 330.0);
}

#[tokio::test]
async fn test_range_is_inclusive() {
    let app = TestApp::new(&sample_sales());
    app.load().await;

    let (_, body) = app
        .get("/api/v1/revenue/total?start_date=2024-06-01&end_date=2024-06-01")
        .await;

    assert_eq!(body["total_revenue"].as_f64().unwrap(), 25.0);
}

#[tokio::test]
async fn test_revenue_by_product() {
    let app = TestApp::new(&sample_sales());
    app.load().await;

    let (status, body) = app.get(&format!("/api/v1/revenue/product?{Q1}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["products_revenue"],
        json!([
            { "product_id": "P1", "product_name": "Product P1", "total_revenue": 270.0 },
            { "product_id": "P2", "product_name": "Product P2", "total_revenue": 60.0 },
        ])
    );
}

#[tokio::test]
async fn test_revenue_by_category() {
    let app = TestApp::new(&sample_sales());
    app.load().await;

    let (_, body) = app
        .get("/api/v1/revenue/category?start_date=2024-01-01&end_date=2024-12-31")
        .await;

    assert_eq!(
        body["categories_revenue"],
        json!([
            { "category": "Electronics", "total_revenue": 270.0 },
            { "category": "Books", "total_revenue": 85.0 },
        ])
    );
}

#[tokio::test]
async fn test_revenue_by_region() {
    let app = TestApp::new(&sample_sales());
    app.load().await;

    let (_, body) = app.get(&format!("/api/v1/revenue/region?{Q1}")).await;

    assert_eq!(
        body["regions_revenue"],
        json!([
            { "region": "North", "total_revenue": 180.0 },
            { "region": "South", "total_revenue": 150.0 },
        ])
    );
}

#[tokio::test]
async fn test_revenue_rejects_bad_ranges() {
    let app = TestApp::new(&sample_sales());

    for query in [
        "",
        "?start_date=2024-01-01",
        "?start_date=01/01/2024&end_date=2024-03-31",
        "?start_date=2024-03-31&end_date=2024-01-01",
    ] {
        let (status, body) = app.get(&format!("/api/v1/revenue/total{query}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {query:?}");
        assert_eq!(body["error"]["status"], 400);
    }
}

#[tokio::test]
async fn test_revenue_over_empty_store_is_zero() {
    let app = TestApp::new(&sample_sales());

    let (_, body) = app.get(&format!("/api/v1/revenue/total?{Q1}")).await;
    assert_eq!(body["total_revenue"].as_f64().unwrap(), 0.0);

    let (_, body) = app.get(&format!("/api/v1/revenue/region?{Q1}")).await;
    assert_eq!(body["regions_revenue"], json!([]));
}
