//! Result persistence boundary.
//!
//! The scraping core only ever talks to a [`ResultSink`]; the concrete sink
//! (filesystem today) is chosen at construction time and injected.

pub mod file_sink;

use std::fmt;
use std::path::{Path, PathBuf};

pub use file_sink::FileSink;

/// Output format of a saved record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveFormat {
    Pdf,
    Html,
    Json,
    Csv,
}

impl SaveFormat {
    /// Parses a config-file format name, case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "html" => Some(Self::Html),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for SaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Outcome of a single save operation.
#[derive(Debug, Clone)]
pub struct StorageResult {
    pub success: bool,
    pub message: String,
    pub path: Option<PathBuf>,
}

impl StorageResult {
    pub fn ok(path: PathBuf) -> Self {
        Self {
            success: true,
            message: "saved".to_string(),
            path: Some(path),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            path: None,
        }
    }
}

/// Persistence capability consumed by the scraping agents.
///
/// One call per enabled format per task; a failed save must not affect other
/// formats of the same task, so `save` reports failure in the result instead
/// of returning an error.
pub trait ResultSink: Send + Sync {
    /// Persists `content` as `filename` in the given format.
    fn save(&self, format: SaveFormat, content: &[u8], filename: &str) -> StorageResult;

    /// Whether a file for this name and format already exists.
    fn file_exists(&self, filename: &str, format: SaveFormat) -> bool;

    /// Full path a save for this name and format would produce.
    fn file_path(&self, filename: &str, format: SaveFormat) -> PathBuf;
}

/// Filename a KW number is stored under: slashes become dots.
pub fn artifact_filename(kw_number: &str) -> String {
    kw_number.replace('/', ".")
}

/// Convenience for sinks rooted at a directory.
pub(crate) fn path_for(root: &Path, filename: &str, format: SaveFormat) -> PathBuf {
    root.join(format!("{}.{}", filename, format.extension()))
}
