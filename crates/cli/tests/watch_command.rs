//! `runwatch watch` against a local status service

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use runwatch_cli::commands::watch::{self, WatchArgs};
use runwatch_cli::output::OutputFormat;
use runwatch_cli::WatchConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

type Hits = Arc<Mutex<HashMap<String, usize>>>;

/// First fetch of every id reports `running`; later fetches report the state
/// encoded in the id (`pass-*`, `fail-*`, `cancel-*`), under an upper-cased id.
async fn execution(Path(id): Path<String>, State(hits): State<Hits>) -> Response {
    let hit = {
        let mut hits = hits.lock();
        let count = hits.entry(id.clone()).or_insert(0);
        *count += 1;
        *count
    };

    let state = if hit == 1 {
        "running"
    } else if id.starts_with("fail") {
        "failed"
    } else if id.starts_with("cancel") {
        "cancelled"
    } else {
        "passed"
    };
    Json(serde_json::json!({
        "id": id.to_uppercase(),
        "lifecycleState": state,
        "outputLines": [format!("\u{1b}[32m{}\u{1b}[0m", state)]
    }))
    .into_response()
}

async fn serve() -> String {
    let hits: Hits = Arc::new(Mutex::new(HashMap::new()));
    let app = Router::new()
        .route("/api/executions/:id", get(execution))
        .with_state(hits);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn run_watch(ids: &[&str]) -> bool {
    let config = WatchConfig {
        base_url: serve().await,
        request_timeout_secs: 5,
        ..Default::default()
    };
    let args = WatchArgs {
        ids: ids.iter().map(|id| id.to_string()).collect(),
        interval_ms: Some(50),
        no_auto_stop: false,
        plain: true,
        quiet: false,
    };

    tokio::time::timeout(
        Duration::from_secs(10),
        watch::execute(args, config, OutputFormat::Plain),
    )
    .await
    .expect("watch did not finish")
    .unwrap()
}

#[tokio::test]
async fn single_job_that_passes() {
    assert!(run_watch(&["pass-1"]).await);
}

#[tokio::test]
async fn single_job_that_fails() {
    assert!(!run_watch(&["fail-1"]).await);
}

#[tokio::test]
async fn single_job_that_is_cancelled() {
    assert!(!run_watch(&["cancel-1"]).await);
}

#[tokio::test]
async fn several_jobs_that_pass() {
    assert!(run_watch(&["pass-a", "pass-b", "pass-c"]).await);
}

#[tokio::test]
async fn several_jobs_with_one_failure() {
    assert!(!run_watch(&["pass-a", "fail-b"]).await);
}

#[tokio::test]
async fn several_jobs_with_one_cancelled() {
    assert!(!run_watch(&["cancel-a", "pass-b"]).await);
}

#[tokio::test]
async fn blank_ids_are_rejected() {
    let args = WatchArgs {
        ids: vec!["  ".to_string()],
        interval_ms: Some(50),
        no_auto_stop: false,
        plain: true,
        quiet: false,
    };
    assert!(watch::execute(args, WatchConfig::default(), OutputFormat::Plain)
        .await
        .is_err());
}
