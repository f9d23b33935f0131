//! Reformatting orchestration
//!
//! Ties the settings, prompt templates, and provider adapters together
//! into the operations a host calls: reformat a piece of text, check a
//! text against the token budget, and probe the configured provider.

use chrono::Utc;
use tracing::debug;

use crate::error::Error;
use crate::prompt::{build_prompt, validate_prompt};
use crate::providers::{AiService, ServiceFactory};
use crate::settings::SettingsManager;
use crate::types::{ConnectionReport, FormatKind, GenerationResult, ProcessingResult};

/// Probe prompt used by [`TextProcessor::test_connection`].
const CONNECTION_TEST_PROMPT: &str =
    "Please respond with \"Connection successful\" to test the API connection.";

/// Orchestrates reformatting against the currently configured provider.
pub struct TextProcessor {
    settings: SettingsManager,
}

impl TextProcessor {
    pub fn new(settings: SettingsManager) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SettingsManager {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsManager {
        &mut self.settings
    }

    /// Reformats `text` into the requested shape.
    ///
    /// An explicit `custom_prompt` takes priority over the saved
    /// per-format template, which takes priority over the built-in
    /// default; templates missing the `{text}` placeholder are skipped.
    pub async fn reformat_text(
        &self,
        text: &str,
        format: FormatKind,
        custom_prompt: Option<&str>,
    ) -> Result<ProcessingResult, Error> {
        if text.trim().is_empty() {
            return Err(Error::Validation(
                "No text provided for reformatting".to_string(),
            ));
        }
        if !self.settings.is_configured() {
            return Err(Error::Configuration(
                "AI service not configured. Please set up your API key in settings.".to_string(),
            ));
        }

        let service = self.select_service()?;
        self.run_reformat(service.as_ref(), text, format, custom_prompt)
            .await
    }

    /// Estimates whether `text` fits the configured token budget,
    /// leaving 20% headroom for the prompt template and the response.
    pub fn validate_text_length(&self, text: &str) -> bool {
        let max_tokens = self.settings.settings().max_tokens;
        // Rough estimate: one token per four characters.
        let estimated_tokens = text.len() as f64 / 4.0;
        estimated_tokens <= f64::from(max_tokens) * 0.8
    }

    /// Sends a fixed probe prompt through the configured provider and
    /// reports the outcome without surfacing an [`Error`].
    pub async fn test_connection(&self) -> ConnectionReport {
        let service = match self.select_service() {
            Ok(service) => service,
            Err(err) => {
                return ConnectionReport {
                    success: false,
                    message: format!("Connection test failed: {err}"),
                };
            }
        };
        self.probe(service.as_ref()).await
    }

    fn select_service(&self) -> Result<Box<dyn AiService>, Error> {
        let kind = self.settings.settings().selected_service;
        let api_key = self.settings.api_key(kind);
        if api_key.is_empty() {
            return Err(Error::Configuration(format!(
                "No API key configured for {kind}"
            )));
        }
        ServiceFactory::create_service(
            kind,
            api_key.to_string(),
            self.settings.settings().max_tokens,
            Some(self.settings.selected_model(kind)),
        )
    }

    async fn run_reformat(
        &self,
        service: &dyn AiService,
        text: &str,
        format: FormatKind,
        custom_prompt: Option<&str>,
    ) -> Result<ProcessingResult, Error> {
        let prompt = self.resolve_prompt(text, format, custom_prompt);
        debug!(service = service.service_name(), %format, "sending reformat request");

        match service.generate_text(&prompt).await {
            GenerationResult::Success { content, .. } => Ok(ProcessingResult {
                original_text: text.to_string(),
                formatted_text: content,
                format,
                timestamp: Utc::now(),
            }),
            GenerationResult::Failure { message } => Err(Error::Processing(message)),
        }
    }

    async fn probe(&self, service: &dyn AiService) -> ConnectionReport {
        match service.generate_text(CONNECTION_TEST_PROMPT).await {
            GenerationResult::Success { .. } => ConnectionReport {
                success: true,
                message: format!("Successfully connected to {}", service.service_name()),
            },
            GenerationResult::Failure { message } => ConnectionReport {
                success: false,
                message,
            },
        }
    }

    fn resolve_prompt(
        &self,
        text: &str,
        format: FormatKind,
        custom_prompt: Option<&str>,
    ) -> String {
        if let Some(template) = custom_prompt {
            if validate_prompt(template) {
                return build_prompt(text, format, Some(template));
            }
        }
        let saved = self.settings.custom_prompt(format);
        if validate_prompt(saved) {
            return build_prompt(text, format, Some(saved));
        }
        build_prompt(text, format, None)
    }
}
