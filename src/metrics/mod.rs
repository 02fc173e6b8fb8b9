//! Test metrics derived from log records.
//!
//! [`analyze`] is a pure reduction. Pass/fail classification, duration
//! extraction and test-name extraction are independent passes over the same
//! message text, so one message can feed any combination of them.

mod extract;

use serde::{Deserialize, Serialize};

use crate::logs::{LogLevel, LogRecord};

pub use self::extract::{classify, duration_secs, test_name, Verdict};

/// Pass/fail state of a named test case seen in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
}

/// A single named test's outcome as extracted from one log message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseOutcome {
    pub name: String,
    pub status: CaseStatus,
    pub timestamp: String,
}

/// Aggregate statistics over a set of log records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_tests: u64,
    pub passed: u64,
    pub failed: u64,
    pub errors: u64,
    pub warnings: u64,
    /// Seconds.
    pub total_duration: f64,
    /// Percent, two decimals.
    pub pass_rate: f64,
    /// Percent, two decimals.
    pub fail_rate: f64,
    /// Seconds per classified test, two decimals.
    pub avg_duration: f64,
    pub test_cases: Vec<TestCaseOutcome>,
    /// Reserved for per-run timing; not populated yet.
    pub execution_timeline: Vec<serde_json::Value>,
}

/// Reduce `records` into [`Metrics`].
///
/// Counts do not depend on input order; `test_cases` follows it.
pub fn analyze<'a, I>(records: I) -> Metrics
where
    I: IntoIterator<Item = &'a LogRecord>,
{
    let mut m = Metrics::default();

    for record in records {
        match record.level {
            LogLevel::Error => m.errors += 1,
            LogLevel::Warning => m.warnings += 1,
            _ => {}
        }

        let message = record.message.as_str();
        let verdict = classify(message);
        match verdict {
            Some(Verdict::Pass) => {
                m.passed += 1;
                m.total_tests += 1;
            }
            Some(Verdict::Fail) => {
                m.failed += 1;
                m.total_tests += 1;
            }
            None => {}
        }

        if let Some(secs) = duration_secs(message) {
            m.total_duration += secs;
        }

        if let Some(name) = test_name(message) {
            // Anything not explicitly passing is reported as failed, even
            // informational lines such as "Starting test_x".
            let status = match verdict {
                Some(Verdict::Pass) => CaseStatus::Passed,
                _ => CaseStatus::Failed,
            };
            m.test_cases.push(TestCaseOutcome {
                name,
                status,
                timestamp: record.timestamp.clone(),
            });
        }
    }

    if m.total_tests > 0 {
        let total = m.total_tests as f64;
        m.pass_rate = round2(m.passed as f64 / total * 100.0);
        m.fail_rate = round2(m.failed as f64 / total * 100.0);
        m.avg_duration = round2(m.total_duration / total);
    }

    m
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
