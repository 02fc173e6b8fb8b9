//! Line-delimited JSON records, one object per line.

use super::{LogParser, LogRecord};

/// Parser for the structured format. Every line is decoded on its own; a
/// bad line is dropped and the next one is tried.
pub struct JsonLinesParser;

impl LogParser for JsonLinesParser {
    fn parse_line(&self, line: &str) -> Option<LogRecord> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}
