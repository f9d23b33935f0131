//! OpenAI adapter
//!
//! Talks to the Chat Completions endpoint with Bearer auth. OpenAI's
//! free tier is the strictest of the supported providers, so this
//! adapter spaces requests two seconds apart on top of the shared
//! sliding-window limiter.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{EngineRequest, RequestEngine};
use crate::error::Error;
use crate::providers::{AiService, catalog_lookup, error_detail};
use crate::retry::{RateLimiter, Tier};
use crate::types::{GenerationResult, ModelInfo, ServiceKind};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(2000);

/// Chat models selectable for reformatting.
pub mod models {
    pub const GPT_3_5_TURBO: &str = "gpt-3.5-turbo";
    pub const GPT_3_5_TURBO_16K: &str = "gpt-3.5-turbo-16k";
    pub const GPT_4: &str = "gpt-4";
    pub const GPT_4_TURBO_PREVIEW: &str = "gpt-4-turbo-preview";
    pub const GPT_4O: &str = "gpt-4o";
    pub const GPT_4O_MINI: &str = "gpt-4o-mini";

    pub const ALL: &[&str] = &[
        GPT_3_5_TURBO,
        GPT_3_5_TURBO_16K,
        GPT_4,
        GPT_4_TURBO_PREVIEW,
        GPT_4O,
        GPT_4O_MINI,
    ];
}

/// Context window and per-1k-token pricing per model.
const MODEL_TABLE: &[(&str, u32, f64)] = &[
    (models::GPT_3_5_TURBO, 4_096, 0.002),
    (models::GPT_3_5_TURBO_16K, 16_384, 0.004),
    (models::GPT_4, 8_192, 0.03),
    (models::GPT_4_TURBO_PREVIEW, 128_000, 0.01),
    (models::GPT_4O, 128_000, 0.005),
    (models::GPT_4O_MINI, 128_000, 0.000_15),
];

/// Raw failure text to user-facing message, first match wins.
const FAILURE_CATALOG: &[(&[&str], &str)] = &[
    (
        &["invalid_api_key", "incorrect api key"],
        "Invalid OpenAI API key. Please check your API key in plugin settings.",
    ),
    (
        &["insufficient_quota", "quota"],
        "OpenAI API quota exceeded. Please check your usage limits or add billing information to your OpenAI account.",
    ),
    (
        &["rate limit", "429"],
        "OpenAI API rate limit exceeded. The plugin will automatically retry. If this persists, please wait a few minutes or upgrade your OpenAI plan.",
    ),
    (
        &["model_not_found", "does not exist"],
        "OpenAI model '{model}' not found. Please select a different model in settings.",
    ),
    (
        &["context_length_exceeded", "maximum context length"],
        "Selected text is too long for the current OpenAI model. Please select shorter text or switch to a model with larger context window (like GPT-4 Turbo).",
    ),
    (
        &["content_filter", "safety"],
        "Content was blocked by OpenAI safety filters. Please try with different text.",
    ),
    (
        &["401", "unauthorized"],
        "Unauthorized access to OpenAI API. Please verify your API key is correct and active.",
    ),
    (
        &["403", "forbidden"],
        "Access denied to OpenAI API. Your API key may not have the required permissions.",
    ),
    (
        &["500", "502", "503"],
        "OpenAI API is temporarily unavailable. Please try again in a few minutes.",
    ),
    (
        &["timeout"],
        "Request timed out. Please try again with shorter text or check your internet connection.",
    ),
    (
        &["network request failed"],
        "Network error occurred. Please check your internet connection and try again.",
    ),
];

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// OpenAI Chat Completions adapter.
pub struct OpenAiService {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    engine: RequestEngine,
    limiter: RateLimiter,
}

impl OpenAiService {
    pub fn new(api_key: String, max_tokens: u32) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: models::GPT_3_5_TURBO.to_string(),
            max_tokens,
            engine: RequestEngine::new().with_min_interval(MIN_REQUEST_INTERVAL),
            limiter: RateLimiter::preset(ServiceKind::OpenAi, Tier::Free),
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
        let value = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).ok()?;
        headers.insert(AUTHORIZATION, value);
        Some(headers)
    }

    fn parse_success(&self, body: &str) -> GenerationResult {
        match serde_json::from_str::<ChatResponse>(body) {
            Ok(data) => {
                let content = data
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message.content.trim().to_string())
                    .filter(|content| !content.is_empty());
                match content {
                    Some(content) => {
                        GenerationResult::success(content, data.usage.map(|u| u.total_tokens))
                    }
                    None => GenerationResult::failure(
                        "No response generated from OpenAI. Please try again.",
                    ),
                }
            }
            Err(err) => self.failure_for(&err.to_string()),
        }
    }

    fn failure_for(&self, raw: &str) -> GenerationResult {
        debug!(service = "openai", error = raw, "mapping failure");
        let message = catalog_lookup(FAILURE_CATALOG, raw, &self.model).unwrap_or_else(|| {
            format!("OpenAI API error: {raw}. Please try again or check your API key and settings.")
        });
        GenerationResult::failure(message)
    }
}

#[async_trait]
impl AiService for OpenAiService {
    async fn generate_text(&self, prompt: &str) -> GenerationResult {
        if !self.validate_api_key() {
            return GenerationResult::failure(
                "Invalid OpenAI API key. Please check your API key in settings.",
            );
        }
        let Some(headers) = self.request_headers() else {
            return GenerationResult::failure(
                "Invalid OpenAI API key. Please check your API key in settings.",
            );
        };

        self.limiter.acquire().await;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: 0.7,
            top_p: 0.9,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };
        let body = match serde_json::to_value(&body) {
            Ok(value) => value,
            Err(err) => return self.failure_for(&err.to_string()),
        };
        let request = EngineRequest {
            url: format!("{}/chat/completions", self.base_url),
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
        ServiceKind::OpenAi.validate_key(&self.api_key)
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn service_name(&self) -> &'static str {
        "OpenAI"
    }

    fn available_models(&self) -> &'static [&'static str] {
        models::ALL
    }

    fn switch_model(&mut self, model: &str) -> Result<(), Error> {
        if !models::ALL.contains(&model) {
            return Err(Error::UnsupportedModel(format!(
                "Unsupported OpenAI model: {model}. Available models: {}",
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
            .unwrap_or((4_096, 0.002));
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
