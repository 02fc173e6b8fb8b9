//! API layer -- axum routes, handlers, and middleware.

mod error;
mod routes;
pub mod state;

pub use self::error::ApiError;
use self::state::AppState;
use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn fallback() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "not found" })),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    fn test_state(root: &TempDir) -> AppState {
        let mut config = Config::default();
        config.paths.log_dir = root.path().join("logs");
        config.paths.test_dir = root.path().join("tests");
        config.paths.work_dir = root.path().to_path_buf();
        config.runner.python = "sh".to_string();
        std::fs::create_dir_all(&config.paths.log_dir).unwrap();
        std::fs::create_dir_all(&config.paths.test_dir).unwrap();
        AppState::new(&config)
    }

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let root = TempDir::new().unwrap();
        let (status, json) = send(router(test_state(&root)), get("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["status"], "running");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let root = TempDir::new().unwrap();
        let (status, json) = send(router(test_state(&root)), get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_logs_sorted_and_filtered() {
        let root = TempDir::new().unwrap();
        let state = test_state(&root);
        write(
            &state.log_dir,
            "suite.log",
            "2024-01-01 10:00:00,000 - INFO - Test PASSED: test_a\n\
             garbage line\n\
             2024-01-03 10:00:00,000 - ERROR - Test FAILED: test_b\n",
        );
        write(
            &state.log_dir,
            "other.json",
            "{\"timestamp\":\"2024-01-02 10:00:00\",\"level\":\"ERROR\",\"message\":\"boom\",\"test_suite\":\"S\"}\n",
        );

        let (status, json) = send(router(state.clone()), get("/api/logs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 3);
        let stamps: Vec<_> = json["logs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["timestamp"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            stamps,
            ["2024-01-03 10:00:00", "2024-01-02 10:00:00", "2024-01-01 10:00:00"]
        );
        assert_eq!(json["logs"][1]["source_file"], "other.json");
        assert_eq!(json["logs"][1]["test_suite"], "S");

        let (_, json) = send(router(state.clone()), get("/api/logs?level=error")).await;
        assert_eq!(json["count"], 2);

        let (_, json) = send(router(state), get("/api/logs?level=ERROR&file=suite")).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["logs"][0]["message"], "Test FAILED: test_b");
    }

    #[tokio::test]
    async fn test_metrics_over_all_files() {
        let root = TempDir::new().unwrap();
        let state = test_state(&root);
        write(
            &state.log_dir,
            "a.log",
            "2024-01-01 10:00:00,000 - INFO - Test PASSED: foo duration: 2.5s\n",
        );
        write(
            &state.log_dir,
            "b.json",
            "{\"timestamp\":\"2024-01-01 10:00:01\",\"level\":\"ERROR\",\"message\":\"Test FAILED: bar duration: 500ms\"}\n",
        );

        let (status, json) = send(router(state), get("/api/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        let m = &json["metrics"];
        assert_eq!(m["total_tests"], 2);
        assert_eq!(m["passed"], 1);
        assert_eq!(m["failed"], 1);
        assert_eq!(m["errors"], 1);
        assert_eq!(m["pass_rate"], 50.0);
        assert_eq!(m["total_duration"], 3.0);
        assert_eq!(m["avg_duration"], 1.5);
        assert_eq!(m["execution_timeline"], json!([]));
    }

    #[tokio::test]
    async fn test_metrics_with_no_logs() {
        let root = TempDir::new().unwrap();
        let (status, json) = send(router(test_state(&root)), get("/api/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["metrics"]["total_tests"], 0);
        assert_eq!(json["metrics"]["pass_rate"], 0.0);
    }

    #[tokio::test]
    async fn test_tests_list() {
        let root = TempDir::new().unwrap();
        let state = test_state(&root);
        write(&state.test_dir, "test_login.py", "pass\n");
        write(&state.test_dir, "conftest.py", "");

        let (status, json) = send(router(state), get("/api/tests/list")).await;
        assert_eq!(status, StatusCode::OK);
        let tests = json["tests"].as_array().unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0]["name"], "test_login.py");
        assert_eq!(tests[0]["type"], "python");
        assert_eq!(tests[0]["size"], 5);
    }

    #[tokio::test]
    async fn test_run_requires_test_file() {
        let root = TempDir::new().unwrap();
        let state = test_state(&root);

        let (status, json) = send(
            router(state.clone()),
            post_json("/api/tests/run", json!({ "test_type": "pytest" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "test_file is required");

        let (status, _) = send(
            router(state.clone()),
            post_json("/api/tests/run", json!({ "test_file": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(state.tracker.is_empty().await);
    }

    #[tokio::test]
    async fn test_run_rejects_bad_input() {
        let root = TempDir::new().unwrap();
        let state = test_state(&root);

        let malformed = Request::builder()
            .method(Method::POST)
            .uri("/api/tests/run")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = send(router(state.clone()), malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let (status, _) = send(
            router(state.clone()),
            post_json("/api/tests/run", json!({ "test_file": "../etc/passwd" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(
            router(state.clone()),
            post_json(
                "/api/tests/run",
                json!({ "test_file": "test_a.py", "test_type": "jest" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("jest"));

        assert!(state.tracker.is_empty().await);
    }

    #[tokio::test]
    async fn test_status_unknown_is_404() {
        let root = TempDir::new().unwrap();
        let (status, json) = send(
            router(test_state(&root)),
            get("/api/tests/status/exec_0_missing.py"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Execution not found");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_then_poll_status_and_history() {
        let root = TempDir::new().unwrap();
        let state = test_state(&root);
        write(&state.test_dir, "test_echo.py", "echo ran\nexit 0\n");

        let (status, json) = send(
            router(state.clone()),
            post_json("/api/tests/run", json!({ "test_file": "test_echo.py" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Test test_echo.py started");
        let id = json["execution_id"].as_str().unwrap().to_string();

        let order = ["queued", "running", "completed"];
        let mut last = 0;
        let execution = loop {
            let (status, json) =
                send(router(state.clone()), get(&format!("/api/tests/status/{}", id))).await;
            assert_eq!(status, StatusCode::OK);
            let current = json["execution"]["status"].as_str().unwrap().to_string();
            let rank = order
                .iter()
                .position(|s| *s == current)
                .unwrap_or_else(|| panic!("unexpected status {}", current));
            assert!(rank >= last, "status regressed to {}", current);
            last = rank;
            if current == "completed" {
                break json["execution"].clone();
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        };
        assert_eq!(execution["exit_code"], 0);
        assert_eq!(execution["stdout"], "ran\n");
        assert_eq!(execution["test_type"], "python");
        assert!(execution["error"].is_null());

        let (_, json) = send(router(state), get("/api/tests/history")).await;
        let history = json["history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["execution_id"], id.as_str());
    }
}
