// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end tests for the HTTP endpoints against an in-memory SQLite store.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

use evodata_ingest::auth::{API_KEY_HEADER, ApiKeys};
use evodata_ingest::handlers::{AppState, SUCCESS_BODY};
use evodata_ingest::migrations;
use evodata_ingest::persistence::SqlitePersistence;
use evodata_ingest::server::{self, END_RUN_PATH, EVOLUTIONARY_DATA_PATH};

const KEY: &str = "e2e-key";

/// Test context: an in-memory database behind the real router.
struct TestContext {
    pool: SqlitePool,
    persistence: Arc<SqlitePersistence>,
    state: Arc<AppState>,
}

impl TestContext {
    async fn new() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        migrations::run_sqlite(&pool)
            .await
            .expect("Failed to run migrations");

        let persistence = Arc::new(SqlitePersistence::new(pool.clone()));
        let state = Arc::new(AppState::new(
            persistence.clone(),
            ApiKeys::parse("other-key\ne2e-key\n"),
            1024 * 1024,
        ));

        Self {
            pool,
            persistence,
            state,
        }
    }

    fn router(&self) -> Router {
        server::router(self.state.clone())
    }

    async fn post(&self, path: &str, key: Option<&str>, body: String) -> (StatusCode, String) {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let request = builder.body(Body::from(body)).unwrap();

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count rows")
    }

    async fn counts(&self) -> [i64; 4] {
        [
            self.count("run").await,
            self.count("generation").await,
            self.count("trees").await,
            self.count("tree_data").await,
        ]
    }
}

fn upload_body(run_id: i64, trees: usize, metric_config: &str) -> String {
    let tree_strings: Vec<String> = (0..trees).map(|i| format!("(+ x{} 0.5)", i)).collect();
    let attribute_data = vec![vec![1.25; metric_config.len()]; trees];
    json!({
        "run_id": run_id,
        "dataset": "boston_housing",
        "trees": tree_strings,
        "attribute_data": attribute_data,
        "is_multithreading_enabled": true,
        "metric_config": metric_config,
        "time": 8.5
    })
    .to_string()
}

#[tokio::test]
async fn test_upload_writes_one_row_per_tree_and_recorded_attribute() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .post(EVOLUTIONARY_DATA_PATH, Some(KEY), upload_body(1, 5, "10101"))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SUCCESS_BODY);
    // 5 trees x 3 recorded attributes
    assert_eq!(ctx.counts().await, [1, 1, 5, 15]);
}

#[tokio::test]
async fn test_resubmission_adds_generation_not_run() {
    let ctx = TestContext::new().await;

    for _ in 0..2 {
        let (status, _) = ctx
            .post(EVOLUTIONARY_DATA_PATH, Some(KEY), upload_body(2, 2, "11"))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(ctx.counts().await, [1, 2, 4, 8]);
}

#[tokio::test]
async fn test_end_run_marks_completed() {
    let ctx = TestContext::new().await;

    ctx.post(EVOLUTIONARY_DATA_PATH, Some(KEY), upload_body(3, 1, "1"))
        .await;
    let (status, body) = ctx
        .post(END_RUN_PATH, Some(KEY), json!({"run_id": 3}).to_string())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SUCCESS_BODY);
    assert!(ctx.persistence.get_run(3).await.unwrap().unwrap().completed);
}

#[tokio::test]
async fn test_end_run_for_unknown_run_succeeds() {
    let ctx = TestContext::new().await;

    let (status, _) = ctx
        .post(END_RUN_PATH, Some(KEY), json!({"run_id": 404}).to_string())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx.counts().await, [0, 0, 0, 0]);
}

#[tokio::test]
async fn test_upload_with_only_run_id_stores_zero_valued_run() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .post(EVOLUTIONARY_DATA_PATH, Some(KEY), json!({"run_id": 31}).to_string())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SUCCESS_BODY);
    assert_eq!(ctx.counts().await, [1, 1, 0, 0]);

    let run = ctx.persistence.get_run(31).await.unwrap().unwrap();
    assert_eq!(run.dataset, "");
    assert_eq!(run.metric_config, "");
    assert!(!run.is_multithreading_enabled);
    assert!(!run.completed);
}

#[tokio::test]
async fn test_upload_without_attribute_data_and_unrecorded_config() {
    let ctx = TestContext::new().await;

    let body = json!({
        "run_id": 32,
        "dataset": "iris",
        "trees": ["(+ x 1)", "(* x x)"],
        "metric_config": "000"
    });
    let (status, _) = ctx
        .post(EVOLUTIONARY_DATA_PATH, Some(KEY), body.to_string())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx.counts().await, [1, 1, 2, 0]);
}

#[tokio::test]
async fn test_null_fields_store_zero_values() {
    let ctx = TestContext::new().await;

    let body = json!({
        "run_id": 33,
        "dataset": null,
        "trees": ["(- x 2)"],
        "attribute_data": [[0.75]],
        "is_multithreading_enabled": null,
        "metric_config": "1",
        "time": null
    });
    let (status, _) = ctx
        .post(EVOLUTIONARY_DATA_PATH, Some(KEY), body.to_string())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx.counts().await, [1, 1, 1, 1]);
    assert_eq!(ctx.persistence.get_run(33).await.unwrap().unwrap().dataset, "");
}

#[tokio::test]
async fn test_end_run_with_empty_object_completes_run_zero() {
    let ctx = TestContext::new().await;

    ctx.post(EVOLUTIONARY_DATA_PATH, Some(KEY), upload_body(0, 1, "1"))
        .await;
    let (status, body) = ctx.post(END_RUN_PATH, Some(KEY), "{}".to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SUCCESS_BODY);
    assert!(ctx.persistence.get_run(0).await.unwrap().unwrap().completed);
}

#[tokio::test]
async fn test_rejected_requests_write_nothing() {
    let ctx = TestContext::new().await;

    let (status, _) = ctx
        .post(EVOLUTIONARY_DATA_PATH, None, upload_body(4, 1, "1"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .post(EVOLUTIONARY_DATA_PATH, Some("E2E-KEY"), upload_body(4, 1, "1"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .post(EVOLUTIONARY_DATA_PATH, Some(KEY), "[1, 2".to_string())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::GET)
        .uri(EVOLUTIONARY_DATA_PATH)
        .header(API_KEY_HEADER, KEY)
        .body(Body::empty())
        .unwrap();
    let response = ctx.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    assert_eq!(ctx.counts().await, [0, 0, 0, 0]);
}

#[tokio::test]
async fn test_config_wider_than_attribute_row_fails_whole_upload() {
    let ctx = TestContext::new().await;

    let mut body: serde_json::Value =
        serde_json::from_str(&upload_body(5, 3, "111")).unwrap();
    body["attribute_data"][2] = json!([1.0, 2.0]);

    let (status, text) = ctx
        .post(EVOLUTIONARY_DATA_PATH, Some(KEY), body.to_string())
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, "Internal Server Error");
    assert_eq!(ctx.counts().await, [0, 0, 0, 0]);

    // The server keeps serving after a failed upload
    let (status, _) = ctx
        .post(EVOLUTIONARY_DATA_PATH, Some(KEY), upload_body(5, 3, "111"))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_http_server_over_tcp() {
    let ctx = TestContext::new().await;

    // Find an available port
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_state = ctx.state.clone();
    let server_handle = tokio::spawn(async move {
        server::run_http_server(addr, server_state, async move {
            shutdown_rx.await.ok();
        })
        .await
    });

    let body = json!({"run_id": 9}).to_string();
    let request = format!(
        "POST {} HTTP/1.1\r\nHost: localhost\r\n{}: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        END_RUN_PATH,
        API_KEY_HEADER,
        KEY,
        body.len(),
        body
    );

    let mut stream = None;
    for _ in 0..50 {
        match tokio::net::TcpStream::connect(addr).await {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    let mut stream = stream.expect("Server did not start listening");

    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"), "got {:?}", response);
    assert!(response.ends_with(SUCCESS_BODY));

    shutdown_tx.send(()).unwrap();
    server_handle.await.unwrap().unwrap();
}
