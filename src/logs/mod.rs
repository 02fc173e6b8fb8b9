//! Log ingestion -- file discovery, format selection, and normalized records.
//!
//! Two on-disk formats are supported: plain-text lines written by a
//! `logging`-style formatter and line-delimited JSON records. The format is
//! chosen from the file extension only; file contents are never sniffed.

pub mod jsonl;
pub mod text;

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use glob::glob;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid glob pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Severity carried by a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    /// Anything else, kept verbatim. An empty string means the record had no level.
    Other(String),
}

impl LogLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "INFO" => LogLevel::Info,
            "WARNING" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            "CRITICAL" => LogLevel::Critical,
            _ => LogLevel::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
            LogLevel::Other(raw) => raw,
        }
    }

    /// Case-insensitive comparison against a user-supplied level name.
    pub fn matches(&self, wanted: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(wanted)
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Other(String::new())
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = lenient_string(deserializer)?;
        Ok(LogLevel::parse(&raw))
    }
}

/// Accept any JSON scalar for a text field: `null` becomes empty, numbers
/// and booleans keep their JSON spelling.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// One normalized entry extracted from a raw log file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// `YYYY-MM-DD HH:MM:SS`; empty when a structured record omits it.
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
    /// Basename of the file the record came from. Stamped by [`collect`].
    #[serde(default)]
    pub source_file: String,
    /// Any additional keys a structured record carried.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Format selection
// ---------------------------------------------------------------------------

/// On-disk log format, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    JsonLines,
}

impl LogFormat {
    /// Glob patterns scanned in the log directory, in concatenation order.
    pub const PATTERNS: [&'static str; 5] = ["*.log", "*.txt", "*.json", "*.jsonl", "*.ndjson"];

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "log" | "txt" => Some(LogFormat::Text),
            "json" | "jsonl" | "ndjson" => Some(LogFormat::JsonLines),
            _ => None,
        }
    }

    pub fn parser(self) -> &'static dyn LogParser {
        match self {
            LogFormat::Text => &text::TextParser,
            LogFormat::JsonLines => &jsonl::JsonLinesParser,
        }
    }
}

/// A per-format line parser.
pub trait LogParser: Send + Sync {
    /// Parse a single line. `None` means the line is dropped.
    fn parse_line(&self, line: &str) -> Option<LogRecord>;

    /// Parse every line of `reader` in order, skipping lines that do not parse.
    ///
    /// An I/O error mid-stream stops reading; records gathered so far are kept.
    fn parse_reader(&self, reader: &mut dyn BufRead, origin: &Path) -> Vec<LogRecord> {
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(path = %origin.display(), line = idx + 1, error = %e, "Stopped reading log file");
                    break;
                }
            };
            match self.parse_line(&line) {
                Some(record) => records.push(record),
                None => debug!(path = %origin.display(), line = idx + 1, "Skipping unparseable line"),
            }
        }
        records
    }
}

// ---------------------------------------------------------------------------
// File-level operations
// ---------------------------------------------------------------------------

/// Parse one log file with the parser matching its extension.
///
/// Never fails: unknown extensions and unreadable files produce an empty
/// vector and a warning.
pub fn parse_file(path: &Path) -> Vec<LogRecord> {
    let Some(format) = LogFormat::from_path(path) else {
        warn!(path = %path.display(), "Unsupported log file extension");
        return Vec::new();
    };

    match open(path) {
        Ok(mut reader) => format.parser().parse_reader(&mut reader, path),
        Err(e) => {
            warn!(error = %e, "Error parsing log file");
            Vec::new()
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>, LogError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| LogError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// List every log file in `dir`. Each pattern's matches are sorted; the
/// pattern groups follow [`LogFormat::PATTERNS`] order.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, LogError> {
    let mut files = Vec::new();
    for pattern in LogFormat::PATTERNS {
        let pattern = glob_in(dir, pattern);
        let mut matched: Vec<PathBuf> = glob(&pattern)
            .map_err(|source| LogError::Pattern {
                pattern: pattern.clone(),
                source,
            })?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        matched.sort();
        files.extend(matched);
    }
    Ok(files)
}

/// Glob `pattern` inside `dir`, with any metacharacters in `dir` escaped.
pub(crate) fn glob_in(dir: &Path, pattern: &str) -> String {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    Path::new(&escaped).join(pattern).to_string_lossy().into_owned()
}

/// Optional filters applied by [`collect`].
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Keep only records whose level matches (case-insensitive).
    pub level: Option<String>,
    /// Keep only files whose basename contains this substring.
    pub file: Option<String>,
}

/// Discover, parse and filter all log files in `dir`.
///
/// Records keep file order within a file; call [`sort_newest_first`] for
/// display order.
pub fn collect(dir: &Path, filter: &LogFilter) -> Result<Vec<LogRecord>, LogError> {
    let mut all = Vec::new();

    for path in discover(dir)? {
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(wanted) = filter.file.as_deref().filter(|f| !f.is_empty()) {
            if !basename.contains(wanted) {
                continue;
            }
        }

        let records = parse_file(&path);
        debug!(file = %basename, count = records.len(), "Parsed log file");
        all.extend(records.into_iter().map(|mut r| {
            r.source_file = basename.clone();
            r
        }));
    }

    if let Some(level) = filter.level.as_deref().filter(|l| !l.is_empty()) {
        all.retain(|r| r.level.matches(level));
    }

    Ok(all)
}

/// Sort by timestamp string, newest first. Stable for equal timestamps.
pub fn sort_newest_first(records: &mut [LogRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
