//! On-demand test execution: lifecycle records, the in-memory tracker, and
//! the background runner that drives external test commands.

pub mod runner;
pub mod tracker;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::runner::TestRunner;
pub use self::tracker::{ExecutionTracker, TrackerError};

/// How a test file is invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// `python <file>`
    #[default]
    Python,
    /// `pytest <file> -v --tb=short`
    Pytest,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Python => write!(f, "python"),
            TestType::Pytest => write!(f, "pytest"),
        }
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "python" => Ok(TestType::Python),
            "pytest" => Ok(TestType::Pytest),
            other => Err(format!("unsupported test_type '{}': expected 'python' or 'pytest'", other)),
        }
    }
}

/// Lifecycle state. Ordered: a status may only move to a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward step.
    pub fn can_become(self, next: ExecutionStatus) -> bool {
        match (self, next) {
            (ExecutionStatus::Queued, ExecutionStatus::Running) => true,
            (ExecutionStatus::Running, s) => s.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Queued => "queued",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One tracked invocation of an external test command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: String,
    pub test_file: String,
    pub test_type: TestType,
    pub status: ExecutionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Set only once `status` is `completed`.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Set only once `status` is `failed`.
    pub error: Option<String>,
}

impl Execution {
    fn queued(execution_id: String, test_file: String, test_type: TestType) -> Self {
        Self {
            execution_id,
            test_file,
            test_type,
            status: ExecutionStatus::Queued,
            start_time: None,
            end_time: None,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use ExecutionStatus::*;
        assert!(Queued.can_become(Running));
        assert!(Running.can_become(Completed));
        assert!(Running.can_become(Failed));
        assert!(!Queued.can_become(Completed));
        assert!(!Completed.can_become(Running));
        assert!(!Failed.can_become(Completed));
        assert!(!Running.can_become(Running));
    }

    #[test]
    fn test_test_type_parse() {
        assert_eq!("pytest".parse::<TestType>(), Ok(TestType::Pytest));
        assert_eq!("python".parse::<TestType>(), Ok(TestType::Python));
        assert!("jest".parse::<TestType>().is_err());
        assert_eq!(TestType::default(), TestType::Python);
    }

    #[test]
    fn test_execution_serializes_lowercase_enums() {
        let exec = Execution::queued("exec_1_test_a.py".into(), "test_a.py".into(), TestType::Pytest);
        let json = serde_json::to_value(&exec).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["test_type"], "pytest");
        assert!(json["start_time"].is_null());
        assert!(json["exit_code"].is_null());
    }
}
