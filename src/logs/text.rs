//! Plain-text log lines: `YYYY-MM-DD HH:MM:SS,mmm - LEVEL - message`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{LogLevel, LogParser, LogRecord};

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}),\d+\s-\s(\w+)\s-\s(.+)")
        .expect("text log pattern is valid")
});

/// Parser for the text format. Lines that do not match the whole prefix
/// shape are dropped; there is no partial recovery.
pub struct TextParser;

impl LogParser for TextParser {
    fn parse_line(&self, line: &str) -> Option<LogRecord> {
        let caps = LINE_RE.captures(line.trim())?;
        Some(LogRecord {
            timestamp: caps[1].to_string(),
            level: LogLevel::parse(&caps[2]),
            message: caps[3].to_string(),
            ..Default::default()
        })
    }
}
