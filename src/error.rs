//! Application error taxonomy.
//!
//! Every per-task failure is converted into one of these variants and carried
//! inside a `TaskResult` at the agent-loop boundary; errors never cross the
//! manager or distributor API as panics.

use crate::storage::SaveFormat;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A court code (or register number) contains a character outside the
    /// fixed mapping table. Never retried.
    #[error("invalid character '{ch}' in KW number '{input}'")]
    InvalidCharacter { input: String, ch: char },

    /// The register has no retrievable content under the current fallback
    /// policy.
    #[error("content unavailable")]
    ContentUnavailable,

    /// Any failure raised by the browser-automation layer, timeouts included.
    #[error("browser automation failed: {0}")]
    Automation(String),

    /// A format-specific save failed. Other formats for the same task are
    /// unaffected.
    #[error("saving {format} failed: {message}")]
    Storage { format: SaveFormat, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Wrapped I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Automation(err.to_string())
    }
}

/// Application result alias
pub type AppResult<T> = Result<T, AppError>;
