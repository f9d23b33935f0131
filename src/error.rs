//! Error types for textsmith
//!
//! All fallible operations in this crate return [`Error`]. Each variant maps
//! to an [`ErrorCategory`], which drives retry decisions and user guidance.

use thiserror::Error;

/// Main error type for the text reformatting pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Missing or malformed configuration (API keys, service selection)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connectivity failures, timeouts, exhausted retries
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream service rejected the request or returned an error payload
    #[error("API error: {0}")]
    Api(String),

    /// Invalid caller input (empty text, oversized text)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal pipeline failures
    #[error("Processing error: {0}")]
    Processing(String),

    /// Service tag not recognized by the factory
    #[error("Unsupported AI service: {0}")]
    UnsupportedService(String),

    /// Model name not in the provider's catalog
    #[error("{0}")]
    UnsupportedModel(String),
}

/// Coarse classification used for recovery decisions and guidance text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Api,
    Validation,
    Processing,
}

impl ErrorCategory {
    /// Stable lowercase tag, suitable for log fields.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Network => "network",
            Self::Api => "api",
            Self::Validation => "validation",
            Self::Processing => "processing",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Returns the category this error belongs to.
    ///
    /// Unsupported service/model errors are configuration problems: the fix
    /// is always a settings change, never a retry.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::UnsupportedService(_) | Self::UnsupportedModel(_) => {
                ErrorCategory::Configuration
            }
            Self::Network(_) => ErrorCategory::Network,
            Self::Api(_) => ErrorCategory::Api,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Processing(_) => ErrorCategory::Processing,
        }
    }

    /// Whether the user can plausibly recover by changing something
    /// (settings, connectivity, input). Only internal processing failures
    /// are considered unrecoverable.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Processing)
    }
}

/// Classifies a bare error message into a category by keyword.
///
/// Used when an error string crosses a boundary that erased its variant,
/// e.g. messages surfaced from a provider failure payload.
pub fn classify(message: &str) -> ErrorCategory {
    if message.contains("API key") || message.contains("not configured") {
        ErrorCategory::Configuration
    } else if message.contains("Network") || message.contains("fetch") {
        ErrorCategory::Network
    } else if message.contains("API error") || message.contains("HTTP") {
        ErrorCategory::Api
    } else if message.contains("text provided") || message.contains("too long") {
        ErrorCategory::Validation
    } else {
        ErrorCategory::Processing
    }
}

/// Whether a raw failure message describes a transient condition worth
/// retrying. Configuration and validation problems never are.
pub fn is_retryable_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    if lower.contains("api key") || lower.contains("not configured") || lower.contains("validation")
    {
        return false;
    }
    lower.contains("network")
        || lower.contains("fetch")
        || lower.contains("timeout")
        || lower.contains("rate limit")
        || lower.contains("server error")
        || lower.contains("503")
        || lower.contains("502")
}

/// Short remediation hint for each category, intended for end-user display.
pub const fn guidance(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Configuration => {
            "Open Settings and configure your AI service and API key."
        }
        ErrorCategory::Network => {
            "Check your internet connection and try again."
        }
        ErrorCategory::Api => {
            "The AI service reported a problem. Wait a moment and try again."
        }
        ErrorCategory::Validation => {
            "Adjust the selected input and try again."
        }
        ErrorCategory::Processing => {
            "Something went wrong while processing. Try again with different text."
        }
    }
}
