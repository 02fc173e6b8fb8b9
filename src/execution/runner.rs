//! Background test runner.
//!
//! Each launch spawns one tokio task that owns the execution's writes: it
//! marks the run as started, invokes the external command, and records the
//! outcome. The caller only gets the task handle; results flow back through
//! the tracker.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{ExecutionTracker, TestType};
use crate::config::Config;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to run {program}: {source}")]
    Invoke {
        program: String,
        source: std::io::Error,
    },

    #[error("test run exceeded timeout of {0:?}")]
    Timeout(Duration),
}

/// Resolved runner settings.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Interpreter used for `python` runs.
    pub python: String,
    /// Test framework executable used for `pytest` runs.
    pub pytest: String,
    /// Directory test files are resolved against.
    pub test_dir: PathBuf,
    /// Working directory of the child process.
    pub work_dir: PathBuf,
    /// Kill the child and fail the run after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl RunnerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            python: config.runner.python.clone(),
            pytest: config.runner.pytest.clone(),
            test_dir: absolutize(&config.paths.test_dir),
            work_dir: absolutize(&config.paths.work_dir),
            timeout: config.runner.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Program and arguments for running `test_file` as `test_type`.
    pub fn command(&self, test_type: TestType, test_file: &str) -> (String, Vec<String>) {
        let path = self.test_dir.join(test_file).to_string_lossy().into_owned();
        match test_type {
            TestType::Python => (self.python.clone(), vec![path]),
            TestType::Pytest => (
                self.pytest.clone(),
                vec![path, "-v".to_string(), "--tb=short".to_string()],
            ),
        }
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[derive(Clone)]
pub struct TestRunner {
    tracker: ExecutionTracker,
    settings: Arc<RunnerSettings>,
}

impl TestRunner {
    pub fn new(tracker: ExecutionTracker, settings: RunnerSettings) -> Self {
        Self {
            tracker,
            settings: Arc::new(settings),
        }
    }

    /// Start `execution_id` in the background and return immediately.
    ///
    /// The execution must already be registered in the tracker in `queued`
    /// state. The returned handle may be dropped; the task keeps running.
    pub fn launch(&self, execution_id: String, test_file: String, test_type: TestType) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            runner.drive(&execution_id, &test_file, test_type).await;
        })
    }

    async fn drive(&self, id: &str, test_file: &str, test_type: TestType) {
        if let Err(e) = self.tracker.mark_running(id).await {
            warn!(execution_id = %id, error = %e, "Could not start execution");
            return;
        }
        info!(execution_id = %id, %test_file, %test_type, "Test run started");

        let recorded = match self.invoke(test_type, test_file).await {
            Ok(output) => {
                let code = exit_code(output.status);
                info!(execution_id = %id, exit_code = code, "Test run finished");
                self.tracker
                    .mark_completed(
                        id,
                        code,
                        String::from_utf8_lossy(&output.stdout).into_owned(),
                        String::from_utf8_lossy(&output.stderr).into_owned(),
                    )
                    .await
            }
            Err(e) => {
                error!(execution_id = %id, error = %e, "Test run failed");
                self.tracker.mark_failed(id, e.to_string()).await
            }
        };

        if let Err(e) = recorded {
            warn!(execution_id = %id, error = %e, "Could not record test outcome");
        }
    }

    async fn invoke(&self, test_type: TestType, test_file: &str) -> Result<Output, RunError> {
        let (program, args) = self.settings.command(test_type, test_file);
        tracing::debug!(%program, ?args, "Executing test command");

        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(&args)
            .current_dir(&self.settings.work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let output = cmd.output();

        let result = match self.settings.timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| RunError::Timeout(limit))?,
            None => output.await,
        };

        result.map_err(|source| RunError::Invoke { program, source })
    }
}

/// Exit code of a finished child. A signal-terminated process reports the
/// negated signal number.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
