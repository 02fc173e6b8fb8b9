//! Message-text extractors used by the metrics reduction.

use once_cell::sync::Lazy;
use regex::Regex;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)duration[:\s]+(\d+\.?\d*)\s*(s|ms|sec)").expect("duration pattern is valid")
});

// Leftmost match wins, so "Test PASSED: test_x" names "PASSED" and
// "Test Case: x" names "Case". Dashboards already key on these names.
static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)test[_\s](\w+)|test case[:\s]+([^\s]+)").expect("test name pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

/// Case-sensitive marker search. Pass markers take precedence.
pub fn classify(message: &str) -> Option<Verdict> {
    if message.contains("PASSED") || message.contains("SUCCESS") {
        Some(Verdict::Pass)
    } else if message.contains("FAILED") || message.contains("FAIL") {
        Some(Verdict::Fail)
    } else {
        None
    }
}

/// First `duration: <n><unit>` token, in seconds.
///
/// Only a lowercase `ms` unit is scaled; any other accepted unit is taken
/// as seconds.
pub fn duration_secs(message: &str) -> Option<f64> {
    let caps = DURATION_RE.captures(message)?;
    let value: f64 = caps[1].parse().ok()?;
    if &caps[2] == "ms" {
        Some(value / 1000.0)
    } else {
        Some(value)
    }
}

/// First test name mentioned in the message.
pub fn test_name(message: &str) -> Option<String> {
    let caps = NAME_RE.captures(message)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}
