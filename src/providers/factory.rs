//! Service construction
//!
//! Maps a [`ServiceKind`] plus credentials onto a boxed [`AiService`]
//! so callers can stay provider-agnostic.

use crate::error::Error;
use crate::providers::{AiService, ClaudeService, GeminiService, OpenAiService};
use crate::types::ServiceKind;

/// Builds provider adapters behind the uniform [`AiService`] trait.
pub struct ServiceFactory;

impl ServiceFactory {
    /// Creates the adapter for `kind`, optionally switched to a
    /// non-default model before first use.
    pub fn create_service(
        kind: ServiceKind,
        api_key: String,
        max_tokens: u32,
        model: Option<&str>,
    ) -> Result<Box<dyn AiService>, Error> {
        let mut service: Box<dyn AiService> = match kind {
            ServiceKind::OpenAi => Box::new(OpenAiService::new(api_key, max_tokens)),
            ServiceKind::Gemini => Box::new(GeminiService::new(api_key, max_tokens)),
            ServiceKind::Claude => Box::new(ClaudeService::new(api_key, max_tokens)),
        };
        if let Some(model) = model {
            service.switch_model(model)?;
        }
        Ok(service)
    }

    /// Checks a key against the format rules for `kind` without
    /// constructing an adapter.
    pub fn validate_api_key(kind: ServiceKind, api_key: &str) -> bool {
        if api_key.trim().is_empty() {
            return false;
        }
        kind.validate_key(api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_service_for_each_kind() {
        let openai =
            ServiceFactory::create_service(ServiceKind::OpenAi, "sk-key".to_string(), 1000, None)
                .unwrap();
        assert_eq!(openai.service_name(), "OpenAI");
        assert_eq!(openai.current_model(), "gpt-3.5-turbo");

        let gemini =
            ServiceFactory::create_service(ServiceKind::Gemini, "AIza-key".to_string(), 1000, None)
                .unwrap();
        assert_eq!(gemini.service_name(), "Google Gemini");
        assert_eq!(gemini.current_model(), "gemini-2.0-flash-lite");

        let claude =
            ServiceFactory::create_service(ServiceKind::Claude, "sk-ant-key".to_string(), 1000, None)
                .unwrap();
        assert_eq!(claude.service_name(), "Anthropic Claude");
        assert_eq!(claude.current_model(), "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn test_create_service_with_model_override() {
        let service = ServiceFactory::create_service(
            ServiceKind::OpenAi,
            "sk-key".to_string(),
            1000,
            Some("gpt-4o"),
        )
        .unwrap();
        assert_eq!(service.current_model(), "gpt-4o");
    }

    #[test]
    fn test_create_service_rejects_unknown_model() {
        let err = ServiceFactory::create_service(
            ServiceKind::Claude,
            "sk-ant-key".to_string(),
            1000,
            Some("claude-9"),
        )
        .unwrap_err();
        match err {
            Error::UnsupportedModel(message) => {
                assert!(message.contains("claude-9"));
            }
            other => panic!("expected UnsupportedModel, got: {other:?}"),
        }
    }

    #[test]
    fn test_validate_api_key_formats() {
        assert!(ServiceFactory::validate_api_key(
            ServiceKind::OpenAi,
            "sk-abcdefghijklmnopqrst"
        ));
        assert!(!ServiceFactory::validate_api_key(
            ServiceKind::OpenAi,
            "invalid-key"
        ));
        assert!(ServiceFactory::validate_api_key(
            ServiceKind::Claude,
            "sk-ant-abcdefghijklmnop"
        ));
        assert!(!ServiceFactory::validate_api_key(
            ServiceKind::Claude,
            "sk-abcdefghijklmnopqrst"
        ));
        assert!(ServiceFactory::validate_api_key(
            ServiceKind::Gemini,
            "AIzaSyExample"
        ));
        assert!(!ServiceFactory::validate_api_key(ServiceKind::Gemini, "key"));
    }

    #[test]
    fn test_validate_api_key_rejects_blank_input() {
        assert!(!ServiceFactory::validate_api_key(ServiceKind::OpenAi, ""));
        assert!(!ServiceFactory::validate_api_key(ServiceKind::Gemini, "   "));
        assert!(!ServiceFactory::validate_api_key(ServiceKind::Claude, "\t"));
    }
}
