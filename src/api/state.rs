use std::path::PathBuf;

use crate::config::Config;
use crate::execution::runner::RunnerSettings;
use crate::execution::{ExecutionTracker, TestRunner};

/// Shared handles injected into every request handler.
#[derive(Clone)]
pub struct AppState {
    pub tracker: ExecutionTracker,
    pub runner: TestRunner,
    pub log_dir: PathBuf,
    pub test_dir: PathBuf,
}

impl AppState {
    /// Build state with a fresh, empty execution registry.
    pub fn new(config: &Config) -> Self {
        let tracker = ExecutionTracker::new();
        let runner = TestRunner::new(tracker.clone(), RunnerSettings::from_config(config));
        Self {
            tracker,
            runner,
            log_dir: config.paths.log_dir.clone(),
            test_dir: config.paths.test_dir.clone(),
        }
    }
}
