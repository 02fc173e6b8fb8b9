//! API route definitions.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiError;
use super::state::AppState;
use crate::execution::TestType;
use crate::logs::{self, LogFilter};
use crate::{discovery, metrics};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/logs", get(get_logs))
        .route("/metrics", get(get_metrics))
        .route("/tests/list", get(list_tests))
        .route("/tests/run", post(run_test))
        .route("/tests/status/{execution_id}", get(test_status))
        .route("/tests/history", get(test_history))
}

async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub level: Option<String>,
    pub file: Option<String>,
}

async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = LogFilter {
        level: query.level,
        file: query.file,
    };
    let dir = state.log_dir.clone();
    let mut records = tokio::task::spawn_blocking(move || logs::collect(&dir, &filter)).await??;
    logs::sort_newest_first(&mut records);

    Ok(Json(json!({
        "success": true,
        "count": records.len(),
        "logs": records,
    })))
}

async fn get_metrics(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let dir = state.log_dir.clone();
    let records =
        tokio::task::spawn_blocking(move || logs::collect(&dir, &LogFilter::default())).await??;
    let metrics = metrics::analyze(&records);

    Ok(Json(json!({
        "success": true,
        "metrics": metrics,
    })))
}

async fn list_tests(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let dir = state.test_dir.clone();
    let tests = tokio::task::spawn_blocking(move || discovery::list_tests(&dir)).await??;

    Ok(Json(json!({
        "success": true,
        "tests": tests,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub test_file: Option<String>,
    pub test_type: Option<String>,
}

async fn run_test(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let test_file = req
        .test_file
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("test_file is required".to_string()))?;
    validate_test_file(&test_file)?;

    let test_type = match req.test_type.as_deref() {
        None | Some("") => TestType::default(),
        Some(raw) => raw.parse::<TestType>().map_err(ApiError::BadRequest)?,
    };

    let execution_id = state.tracker.create(&test_file, test_type).await;
    // Fire and forget; the tracker entry is the only channel back.
    state
        .runner
        .launch(execution_id.clone(), test_file.clone(), test_type);
    info!(%execution_id, %test_file, %test_type, "Test run requested");

    Ok(Json(json!({
        "success": true,
        "execution_id": execution_id,
        "message": format!("Test {} started", test_file),
    })))
}

/// Test files are bare names inside the test directory.
fn validate_test_file(name: &str) -> Result<(), ApiError> {
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(ApiError::BadRequest(format!(
            "invalid test_file '{}': must be a file name inside the test directory",
            name
        )));
    }
    Ok(())
}

async fn test_status(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let execution = state
        .tracker
        .get(&execution_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Execution not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "execution": execution,
    })))
}

async fn test_history(State(state): State<AppState>) -> Json<Value> {
    let history = state.tracker.list().await;
    Json(json!({
        "success": true,
        "history": history,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_test_file() {
        assert!(validate_test_file("test_login.py").is_ok());
        assert!(validate_test_file("test login.py").is_ok());
        assert!(validate_test_file("../secrets.py").is_err());
        assert!(validate_test_file("sub/test_a.py").is_err());
        assert!(validate_test_file("..").is_err());
        assert!(validate_test_file("a\\b.py").is_err());
    }
}
