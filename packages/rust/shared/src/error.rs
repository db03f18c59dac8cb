//! Error types for VC Scout.
//!
//! Library crates use [`ScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre`; the HTTP surface maps
//! [`ScoutError::code`] to a status code.

use std::path::PathBuf;

/// Retry delay reported when the provider does not supply one.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Top-level error type for all VC Scout operations.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    /// Missing model credential or an unreadable config file.
    #[error("config error: {message}")]
    Config { message: String },

    /// Caller input rejected before any I/O.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The model answered, but not with the expected JSON object.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// The model provider signalled a rate or quota limit.
    #[error("quota exceeded: retry after {retry_after_secs}s")]
    QuotaExceeded { retry_after_secs: u64 },

    /// Catch-all for provider and transport faults.
    #[error("pipeline error: {message}")]
    Pipeline {
        message: String,
        /// Diagnostic rendering of the underlying error. Only populated in
        /// development builds.
        detail: Option<String>,
    },

    /// Network/HTTP error while fetching a page.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScoutError>;

impl ScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create a pipeline error without diagnostic detail.
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline {
            message: msg.into(),
            detail: None,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable snake_case code for this error, used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "configuration_error",
            Self::Validation { .. } => "validation_error",
            Self::Extraction { .. } => "extraction_error",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::Pipeline { .. } | Self::Network(_) | Self::Io { .. } => "pipeline_error",
        }
    }
}
