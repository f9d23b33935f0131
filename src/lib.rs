//! textsmith
//!
//! Provider-agnostic text reformatting over OpenAI-style, Claude-style,
//! and Gemini-style generation APIs, with client-side rate limiting,
//! bounded retries, and error classification.
#![deny(unsafe_code)]

pub mod engine;
pub mod error;
pub mod processor;
pub mod prompt;
pub mod providers;
pub mod retry;
pub mod settings;
pub mod types;

pub use error::{Error, ErrorCategory};
pub use processor::TextProcessor;
pub use providers::{AiService, ServiceFactory};
pub use settings::{FormatterSettings, SettingsManager, SettingsStore};
pub use types::{
    ConnectionReport, FormatKind, GenerationResult, ModelInfo, ProcessingResult, ServiceKind,
};
