//! Gemini adapter
//!
//! Talks to the Generative Language REST endpoint. The model name is
//! part of the URL path rather than the body, auth rides in the
//! `x-goog-api-key` header, and generated text arrives split across
//! candidate parts that are concatenated before use.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{EngineRequest, RequestEngine};
use crate::error::Error;
use crate::providers::{AiService, catalog_lookup, error_detail};
use crate::retry::{RateLimiter, Tier};
use crate::types::{GenerationResult, ModelInfo, ServiceKind};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Text-generation models selectable for reformatting.
pub mod models {
    pub const GEMINI_2_5_PRO: &str = "gemini-2.5-pro";
    pub const GEMINI_2_5_FLASH: &str = "gemini-2.5-flash";
    pub const GEMINI_2_5_FLASH_LITE_PREVIEW: &str = "gemini-2.5-flash-lite-preview-06-17";
    pub const GEMINI_2_0_FLASH: &str = "gemini-2.0-flash";
    pub const GEMINI_2_0_FLASH_LITE: &str = "gemini-2.0-flash-lite";
    pub const GEMINI_1_5_FLASH: &str = "gemini-1.5-flash";
    pub const GEMINI_1_5_PRO: &str = "gemini-1.5-pro";
    pub const GEMINI_1_0_PRO: &str = "gemini-1.0-pro";

    pub const ALL: &[&str] = &[
        GEMINI_2_5_PRO,
        GEMINI_2_5_FLASH,
        GEMINI_2_5_FLASH_LITE_PREVIEW,
        GEMINI_2_0_FLASH,
        GEMINI_2_0_FLASH_LITE,
        GEMINI_1_5_FLASH,
        GEMINI_1_5_PRO,
        GEMINI_1_0_PRO,
    ];
}

/// Context window and per-1k-token pricing per model.
const MODEL_TABLE: &[(&str, u32, f64)] = &[
    (models::GEMINI_2_5_PRO, 2_000_000, 0.001),
    (models::GEMINI_2_5_FLASH, 1_000_000, 0.000_1),
    (models::GEMINI_2_5_FLASH_LITE_PREVIEW, 1_000_000, 0.000_05),
    (models::GEMINI_2_0_FLASH, 1_000_000, 0.000_1),
    (models::GEMINI_2_0_FLASH_LITE, 1_000_000, 0.000_05),
    (models::GEMINI_1_5_FLASH, 1_000_000, 0.000_1),
    (models::GEMINI_1_5_PRO, 1_000_000, 0.001),
    (models::GEMINI_1_0_PRO, 30_720, 0.000_5),
];

/// Raw failure text to user-facing message, first match wins.
const FAILURE_CATALOG: &[(&[&str], &str)] = &[
    (
        &["api_key_invalid", "invalid api key"],
        "Invalid Gemini API key. Please check your API key in settings.",
    ),
    (
        &["quota_exceeded", "quota"],
        "Gemini API quota exceeded. Please check your usage limits.",
    ),
    (
        &["rate_limit_exceeded", "rate limit"],
        "Gemini API rate limit exceeded. Please try again later.",
    ),
    (
        &["safety"],
        "Content was blocked by Gemini safety filters. Please try different text.",
    ),
    (
        &["recitation"],
        "Content may contain copyrighted material. Please try different text.",
    ),
    (
        &["404", "not found"],
        "Gemini model '{model}' not found. Try switching to 'gemini-1.5-pro' or 'gemini-1.0-pro' in settings.",
    ),
    (
        &["403", "forbidden"],
        "Access denied to Gemini API. Please check your API key permissions.",
    ),
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
    top_p: f64,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u32>,
}

/// Gemini generateContent adapter.
pub struct GeminiService {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    engine: RequestEngine,
    limiter: RateLimiter,
}

impl GeminiService {
    pub fn new(api_key: String, max_tokens: u32) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: models::GEMINI_2_0_FLASH_LITE.to_string(),
            max_tokens,
            engine: RequestEngine::new(),
            limiter: RateLimiter::preset(ServiceKind::Gemini, Tier::Free),
        }
    }

    /// Points the adapter at a different endpoint. Tests use this to
    /// talk to a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replaces the HTTP engine, e.g. with one tuned for fast retries.
    pub fn with_engine(mut self, engine: RequestEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Replaces the client-side rate limiter.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    fn request_headers(&self) -> Option<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key).ok()?);
        Some(headers)
    }

    fn parse_success(&self, body: &str) -> GenerationResult {
        match serde_json::from_str::<GenerateContentResponse>(body) {
            Ok(data) => {
                let Some(candidate) = data.candidates.into_iter().next() else {
                    return GenerationResult::failure("No response received from Gemini");
                };
                let text = candidate
                    .content
                    .map(|content| {
                        content
                            .parts
                            .into_iter()
                            .map(|part| part.text)
                            .collect::<String>()
                    })
                    .unwrap_or_default();
                let text = text.trim();
                if text.is_empty() {
                    return GenerationResult::failure("Empty response from Gemini");
                }
                let tokens = data
                    .usage_metadata
                    .and_then(|usage| usage.total_token_count);
                GenerationResult::success(text, tokens)
            }
            Err(err) => self.failure_for(&err.to_string()),
        }
    }

    fn failure_for(&self, raw: &str) -> GenerationResult {
        debug!(service = "gemini", error = raw, "mapping failure");
        let message = catalog_lookup(FAILURE_CATALOG, raw, &self.model)
            .unwrap_or_else(|| format!("Gemini API error: {raw}"));
        GenerationResult::failure(message)
    }
}

#[async_trait]
impl AiService for GeminiService {
    async fn generate_text(&self, prompt: &str) -> GenerationResult {
        if !self.validate_api_key() {
            return GenerationResult::failure("Invalid Gemini API key");
        }
        let Some(headers) = self.request_headers() else {
            return GenerationResult::failure("Invalid Gemini API key");
        };

        self.limiter.acquire().await;

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
                temperature: 0.7,
                top_p: 0.8,
                top_k: 40,
            },
        };
        let body = match serde_json::to_value(&body) {
            Ok(value) => value,
            Err(err) => return self.failure_for(&err.to_string()),
        };
        let request = EngineRequest {
            url: format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ),
            headers,
            body,
        };

        match self.engine.send(request).await {
            Ok(response) if response.is_success() => self.parse_success(&response.body),
            Ok(response) => {
                let detail = error_detail(response.status, &response.body);
                self.failure_for(&format!("HTTP {}: {detail}", response.status.as_u16()))
            }
            Err(err) => self.failure_for(&err.to_string()),
        }
    }

    fn validate_api_key(&self) -> bool {
        ServiceKind::Gemini.validate_key(&self.api_key)
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn service_name(&self) -> &'static str {
        "Google Gemini"
    }

    fn available_models(&self) -> &'static [&'static str] {
        models::ALL
    }

    fn switch_model(&mut self, model: &str) -> Result<(), Error> {
        if !models::ALL.contains(&model) {
            return Err(Error::UnsupportedModel(format!(
                "Unsupported model: {model}. Available models: {}",
                models::ALL.join(", ")
            )));
        }
        self.model = model.to_string();
        Ok(())
    }

    fn current_model(&self) -> &str {
        &self.model
    }

    fn model_info(&self) -> ModelInfo {
        let (context_length, cost_per_1k_tokens) = MODEL_TABLE
            .iter()
            .find(|(name, ..)| *name == self.model)
            .map(|&(_, context, cost)| (context, cost))
            .unwrap_or((1_000_000, 0.000_1));
        ModelInfo {
            name: self.model.clone(),
            context_length,
            cost_per_1k_tokens,
        }
    }

    fn update_api_key(&mut self, api_key: String) {
        self.api_key = api_key;
    }

    fn update_max_tokens(&mut self, max_tokens: u32) {
        self.max_tokens = max_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> GeminiService {
        GeminiService::new("AIzaSyTest123456".to_string(), 1000)
    }

    #[test]
    fn test_defaults() {
        let service = service();
        assert_eq!(service.service_name(), "Google Gemini");
        assert_eq!(service.current_model(), "gemini-2.0-flash-lite");
        assert!(service.validate_api_key());
    }

    #[test]
    fn test_switch_model_validates_against_catalog() {
        let mut service = service();
        service.switch_model("gemini-1.5-pro").unwrap();
        assert_eq!(service.current_model(), "gemini-1.5-pro");

        let err = service.switch_model("gemini-ultra").unwrap_err();
        match err {
            Error::UnsupportedModel(message) => {
                assert!(message.starts_with("Unsupported model: gemini-ultra."));
                assert!(message.contains("gemini-2.0-flash-lite"));
            }
            other => panic!("expected UnsupportedModel, got: {other:?}"),
        }
        assert_eq!(service.current_model(), "gemini-1.5-pro");
    }

    #[test]
    fn test_model_info_table_and_fallback() {
        let mut service = service();
        assert_eq!(service.model_info().context_length, 1_000_000);
        assert_eq!(service.model_info().cost_per_1k_tokens, 0.000_05);

        service.switch_model("gemini-2.5-pro").unwrap();
        assert_eq!(service.model_info().context_length, 2_000_000);
        assert_eq!(service.model_info().cost_per_1k_tokens, 0.001);

        service.switch_model("gemini-1.0-pro").unwrap();
        assert_eq!(service.model_info().context_length, 30_720);

        service.model = "gemini-experimental".to_string();
        assert_eq!(service.model_info().context_length, 1_000_000);
        assert_eq!(service.model_info().cost_per_1k_tokens, 0.000_1);
    }

    #[test]
    fn test_failure_catalog_maps_known_errors() {
        let service = service();

        let cases = [
            (
                "API_KEY_INVALID: check credentials",
                "Invalid Gemini API key. Please check your API key in settings.",
            ),
            (
                "RESOURCE_EXHAUSTED: quota exceeded for metric",
                "Gemini API quota exceeded. Please check your usage limits.",
            ),
            (
                "RATE_LIMIT_EXCEEDED",
                "Gemini API rate limit exceeded. Please try again later.",
            ),
            (
                "Candidate was blocked due to SAFETY",
                "Content was blocked by Gemini safety filters. Please try different text.",
            ),
            (
                "Candidate was blocked due to RECITATION",
                "Content may contain copyrighted material. Please try different text.",
            ),
            (
                "HTTP 404: requested entity was not found",
                "Gemini model 'gemini-2.0-flash-lite' not found. Try switching to 'gemini-1.5-pro' or 'gemini-1.0-pro' in settings.",
            ),
            (
                "HTTP 403: Forbidden",
                "Access denied to Gemini API. Please check your API key permissions.",
            ),
        ];
        for (raw, expected) in cases {
            match service.failure_for(raw) {
                GenerationResult::Failure { message } => assert_eq!(message, expected, "for {raw}"),
                other => panic!("expected failure, got: {other:?}"),
            }
        }
    }

    #[test]
    fn test_failure_fallback_embeds_raw_error() {
        let service = service();
        match service.failure_for("grpc stream reset") {
            GenerationResult::Failure { message } => {
                assert_eq!(message, "Gemini API error: grpc stream reset");
            }
            other => panic!("expected failure, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_success_concatenates_parts() {
        let service = service();
        let body = r###"{
            "candidates": [{"content": {"parts": [{"text": "## Tasks\n"}, {"text": "- [ ] one"}]}}],
            "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 9, "totalTokenCount": 14}
        }"###;
        match service.parse_success(body) {
            GenerationResult::Success {
                content,
                tokens_used,
            } => {
                assert_eq!(content, "## Tasks\n- [ ] one");
                assert_eq!(tokens_used, Some(14));
            }
            other => panic!("expected success, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_success_without_candidates() {
        let service = service();
        match service.parse_success(r#"{"candidates": []}"#) {
            GenerationResult::Failure { message } => {
                assert_eq!(message, "No response received from Gemini");
            }
            other => panic!("expected failure, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_success_with_blank_text() {
        let service = service();
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "  \n "}]}}]}"#;
        match service.parse_success(body) {
            GenerationResult::Failure { message } => {
                assert_eq!(message, "Empty response from Gemini");
            }
            other => panic!("expected failure, got: {other:?}"),
        }
    }

    #[test]
    fn test_request_body_uses_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: "hello" }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 900,
                temperature: 0.7,
                top_p: 0.8,
                top_k: 40,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 900);
        assert_eq!(value["generationConfig"]["temperature"], 0.7);
        assert_eq!(value["generationConfig"]["topP"], 0.8);
        assert_eq!(value["generationConfig"]["topK"], 40);
    }

    #[tokio::test]
    async fn test_generate_text_rejects_malformed_key_without_network() {
        let service = GeminiService::new("short".to_string(), 1000);
        match service.generate_text("hello").await {
            GenerationResult::Failure { message } => {
                assert_eq!(message, "Invalid Gemini API key");
            }
            other => panic!("expected failure, got: {other:?}"),
        }
    }
}
