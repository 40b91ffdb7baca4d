//! Result and error types for the export pipeline.

use thiserror::Error;

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can occur while exporting a card
#[derive(Debug, Error)]
pub enum ExportError {
    /// Input rejected before any side effect was attempted
    #[error("Validation failed: {message}")]
    Validation {
        /// Error message
        message: String,
    },

    /// Rasterizing the render surface failed
    #[error("Capture failed: {message}")]
    Capture {
        /// Error message
        message: String,
    },

    /// Palette, quantization or bitstream step failed
    #[error("Encoding failed: {message}")]
    Encoding {
        /// Error message
        message: String,
    },

    /// Wall-clock budget exceeded
    #[error(
        "Export timed out after {elapsed_ms}ms (budget {budget_ms}ms). \
         Try a smaller export resolution or a shorter text."
    )]
    Timeout {
        /// Time spent before the export was abandoned
        elapsed_ms: u64,
        /// Configured budget
        budget_ms: u64,
    },

    /// Design file could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a capture error
    #[must_use]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
        }
    }

    /// Create an encoding error
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error is a budget timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Short machine-readable category name
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Capture { .. } => "capture",
            Self::Encoding { .. } => "encoding",
            Self::Timeout { .. } => "timeout",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
        }
    }
}
