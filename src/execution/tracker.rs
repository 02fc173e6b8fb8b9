//! In-memory registry of test executions.
//!
//! The tracker is a cheap cloneable handle over `Arc<RwLock<HashMap>>`. It is
//! created once by the caller and handed to both the API state and every
//! background runner task. Entries are never evicted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{Execution, ExecutionStatus, TestType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("execution {0} not found")]
    NotFound(String),

    #[error("execution {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },
}

#[derive(Clone, Default)]
pub struct ExecutionTracker {
    executions: Arc<RwLock<HashMap<String, Execution>>>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new execution in `queued` state and return its id.
    ///
    /// Ids are `exec_<unix seconds>_<test_file>`. A second request for the
    /// same file within the same second gets a `-<n>` suffix.
    pub async fn create(&self, test_file: &str, test_type: TestType) -> String {
        let base = format!("exec_{}_{}", Utc::now().timestamp(), test_file);

        let mut executions = self.executions.write().await;
        let mut id = base.clone();
        let mut n = 1;
        while executions.contains_key(&id) {
            n += 1;
            id = format!("{}-{}", base, n);
        }

        let exec = Execution::queued(id.clone(), test_file.to_string(), test_type);
        executions.insert(id.clone(), exec);
        debug!(execution_id = %id, %test_type, "Execution queued");
        id
    }

    /// Snapshot of one execution.
    pub async fn get(&self, id: &str) -> Option<Execution> {
        self.executions.read().await.get(id).cloned()
    }

    /// Snapshot of all executions, newest `start_time` first. Executions that
    /// have not started yet sort last.
    pub async fn list(&self) -> Vec<Execution> {
        let mut all: Vec<Execution> = self.executions.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then_with(|| b.execution_id.cmp(&a.execution_id))
        });
        all
    }

    pub async fn len(&self) -> usize {
        self.executions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn mark_running(&self, id: &str) -> Result<(), TrackerError> {
        self.transition(id, ExecutionStatus::Running, |exec| {
            exec.start_time = Some(Utc::now());
        })
        .await
    }

    pub async fn mark_completed(
        &self,
        id: &str,
        exit_code: i32,
        stdout: String,
        stderr: String,
    ) -> Result<(), TrackerError> {
        self.transition(id, ExecutionStatus::Completed, move |exec| {
            exec.end_time = Some(Utc::now());
            exec.exit_code = Some(exit_code);
            exec.stdout = stdout;
            exec.stderr = stderr;
        })
        .await
    }

    pub async fn mark_failed(&self, id: &str, error: String) -> Result<(), TrackerError> {
        self.transition(id, ExecutionStatus::Failed, move |exec| {
            exec.end_time = Some(Utc::now());
            exec.error = Some(error);
        })
        .await
    }

    /// Apply `update` and the new status in one write, or refuse if the
    /// move would not be forward.
    async fn transition<F>(&self, id: &str, to: ExecutionStatus, update: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut Execution),
    {
        let mut executions = self.executions.write().await;
        let exec = executions
            .get_mut(id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;

        if !exec.status.can_become(to) {
            warn!(execution_id = %id, from = %exec.status, %to, "Rejected status regression");
            return Err(TrackerError::InvalidTransition {
                id: id.to_string(),
                from: exec.status,
                to,
            });
        }

        update(exec);
        exec.status = to;
        debug!(execution_id = %id, status = %to, "Execution updated");
        Ok(())
    }
}
