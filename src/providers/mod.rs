//! Provider adapters
//!
//! One adapter per AI service, all behind the [`AiService`] trait.
//! Adapters own their HTTP engine and client-side rate limiter, build the
//! provider's wire format, and translate raw failures into the curated
//! user-facing messages of their failure catalog.

pub mod claude;
pub mod factory;
pub mod gemini;
pub mod openai;

pub use claude::ClaudeService;
pub use factory::ServiceFactory;
pub use gemini::GeminiService;
pub use openai::OpenAiService;

use async_trait::async_trait;

use crate::error::Error;
use crate::types::{GenerationResult, ModelInfo};

/// Prompt sent by the default connectivity probe.
pub(crate) const TEST_PROMPT: &str = "Hello, this is a test message.";

/// Uniform surface over the supported AI text generation services.
#[async_trait]
pub trait AiService: Send + Sync {
    /// Sends one prompt and returns the generated text.
    ///
    /// Expected API-level failures come back as
    /// [`GenerationResult::Failure`] with a user-facing message; `Err`
    /// is reserved for faults below the provider protocol.
    async fn generate_text(&self, prompt: &str) -> GenerationResult;

    /// Structural check of the configured API key.
    fn validate_api_key(&self) -> bool;

    /// Response token budget sent with each request.
    fn max_tokens(&self) -> u32;

    /// Human-readable service name, e.g. `"OpenAI"`.
    fn service_name(&self) -> &'static str;

    /// Models this adapter accepts for [`switch_model`](Self::switch_model).
    fn available_models(&self) -> &'static [&'static str];

    /// Selects another model from the catalog.
    fn switch_model(&mut self, model: &str) -> Result<(), Error>;

    /// Model used for subsequent requests.
    fn current_model(&self) -> &str;

    /// Context window and pricing metadata for the current model.
    fn model_info(&self) -> ModelInfo;

    fn update_api_key(&mut self, api_key: String);

    fn update_max_tokens(&mut self, max_tokens: u32);

    /// Cheap connectivity probe: one tiny generation round-trip.
    ///
    /// A key that fails the structural check shorts to `false` without
    /// touching the network.
    async fn test_connection(&self) -> bool {
        if !self.validate_api_key() {
            return false;
        }
        self.generate_text(TEST_PROMPT).await.is_success()
    }
}

impl std::fmt::Debug for dyn AiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiService")
            .field("service", &self.service_name())
            .field("model", &self.current_model())
            .finish_non_exhaustive()
    }
}

/// Pulls the human-readable detail out of a non-success response body.
///
/// All three providers wrap errors as `{"error": {"message": ...}}`.
/// Bodies that don't parse fall back to their raw text, then to the
/// status line reason.
pub(crate) fn error_detail(status: reqwest::StatusCode, body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct Envelope {
        error: Option<Detail>,
    }
    #[derive(serde::Deserialize)]
    struct Detail {
        message: Option<String>,
    }

    let parsed = serde_json::from_str::<Envelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|detail| detail.message)
        .filter(|message| !message.is_empty());
    match parsed {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status.canonical_reason().unwrap_or("Unknown error").to_string(),
    }
}

/// Looks up the first catalog entry whose patterns match the raw failure
/// text, interpolating the current model name into the message.
///
/// Matching is case-insensitive on the raw text; patterns are stored
/// lowercase. Catalog order is significant, more specific entries first.
pub(crate) fn catalog_lookup(
    catalog: &[(&[&str], &str)],
    raw: &str,
    model: &str,
) -> Option<String> {
    let lower = raw.to_lowercase();
    catalog.iter().find_map(|(patterns, message)| {
        patterns
            .iter()
            .any(|pattern| lower.contains(pattern))
            .then(|| message.replace("{model}", model))
    })
}
