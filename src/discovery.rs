//! Runnable test file discovery.

use std::path::Path;

use chrono::{DateTime, Local};
use glob::glob;
use serde::Serialize;
use tracing::warn;

use crate::execution::TestType;
use crate::logs;

/// Naming convention for runnable test files.
pub const TEST_PATTERN: &str = "test_*.py";

/// A test file found in the test directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestFile {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub test_type: TestType,
    /// Bytes.
    pub size: u64,
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub modified: String,
}

/// List `test_*.py` files in `dir`, sorted by name.
///
/// A missing directory yields an empty list. Files whose metadata cannot be
/// read are skipped with a warning.
pub fn list_tests(dir: &Path) -> anyhow::Result<Vec<TestFile>> {
    let pattern = logs::glob_in(dir, TEST_PATTERN);
    let mut paths: Vec<_> = glob(&pattern)?.filter_map(Result::ok).collect();
    paths.sort();

    let mut tests = Vec::with_capacity(paths.len());
    for path in paths {
        let meta = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable test file");
                continue;
            }
        };

        let modified = meta
            .modified()
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        tests.push(TestFile {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_string_lossy().into_owned(),
            test_type: TestType::Python,
            size: meta.len(),
            modified,
        });
    }

    Ok(tests)
}
