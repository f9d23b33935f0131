//! Core data types shared across the crate
//!
//! Service and format identifiers, generation outcomes, and the result
//! record produced by a completed reformatting run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// The AI services this crate can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    OpenAi,
    Gemini,
    Claude,
}

impl ServiceKind {
    /// Stable lowercase tag used in settings files and log fields.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Claude => "claude",
        }
    }

    /// Structural check on an API key for this service.
    ///
    /// Only shape is verified, never validity against the live API:
    /// OpenAI keys are `sk-` prefixed, Claude keys `sk-ant-` prefixed,
    /// Gemini keys `AIza` prefixed, each with a minimum length.
    pub fn validate_key(&self, key: &str) -> bool {
        let key = key.trim();
        match self {
            Self::OpenAi => key.starts_with("sk-") && key.len() > 20,
            Self::Claude => key.starts_with("sk-ant-") && key.len() > 20,
            Self::Gemini => key.starts_with("AIza") && key.len() > 10,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            "claude" => Ok(Self::Claude),
            other => Err(Error::UnsupportedService(other.to_string())),
        }
    }
}

/// Target output shape for a reformatting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// Structured markdown notes with headers and bullet points
    Notes,
    /// Flowing paragraphs
    Prose,
    /// Markdown checkbox list
    Todo,
    /// User-supplied prompt template
    Custom,
}

impl FormatKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Prose => "prose",
            Self::Todo => "todo",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single text generation call against a provider.
///
/// Providers report expected API-level failures (bad key, quota, safety
/// blocks) as `Failure` with a user-facing message rather than as [`Error`],
/// so callers can distinguish "the service said no" from pipeline faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Success {
        content: String,
        tokens_used: Option<u32>,
    },
    Failure {
        message: String,
    },
}

impl GenerationResult {
    pub fn success(content: impl Into<String>, tokens_used: Option<u32>) -> Self {
        Self::Success {
            content: content.into(),
            tokens_used,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Record of one completed reformatting run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub original_text: String,
    pub formatted_text: String,
    pub format: FormatKind,
    pub timestamp: DateTime<Utc>,
}

/// Static metadata about a provider model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    pub context_length: u32,
    pub cost_per_1k_tokens: f64,
}

/// Outcome of a connectivity probe against the configured service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
}
