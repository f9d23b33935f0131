//! Claude adapter
//!
//! Talks to the Anthropic Messages endpoint. Auth rides in the
//! `x-api-key` header next to a pinned `anthropic-version`, and token
//! usage is reported split into input and output counts.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{EngineRequest, RequestEngine};
use crate::error::Error;
use crate::providers::{AiService, catalog_lookup, error_detail};
use crate::retry::{RateLimiter, Tier};
use crate::types::{GenerationResult, ModelInfo, ServiceKind};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages-capable models selectable for reformatting.
pub mod models {
    pub const CLAUDE_3_5_SONNET: &str = "claude-3-5-sonnet-20241022";
    pub const CLAUDE_3_5_HAIKU: &str = "claude-3-5-haiku-20241022";
    pub const CLAUDE_3_OPUS: &str = "claude-3-opus-20240229";
    pub const CLAUDE_3_SONNET: &str = "claude-3-sonnet-20240229";
    pub const CLAUDE_3_HAIKU: &str = "claude-3-haiku-20240307";

    pub const ALL: &[&str] = &[
        CLAUDE_3_5_SONNET,
        CLAUDE_3_5_HAIKU,
        CLAUDE_3_OPUS,
        CLAUDE_3_SONNET,
        CLAUDE_3_HAIKU,
    ];
}

/// Context window and per-1k-token pricing per model.
const MODEL_TABLE: &[(&str, u32, f64)] = &[
    (models::CLAUDE_3_5_SONNET, 200_000, 0.003),
    (models::CLAUDE_3_5_HAIKU, 200_000, 0.000_25),
    (models::CLAUDE_3_OPUS, 200_000, 0.015),
    (models::CLAUDE_3_SONNET, 200_000, 0.003),
    (models::CLAUDE_3_HAIKU, 200_000, 0.000_25),
];

/// Raw failure text to user-facing message, first match wins.
const FAILURE_CATALOG: &[(&[&str], &str)] = &[
    (
        &["invalid_api_key", "authentication"],
        "Invalid Claude API key. Please check your API key in settings.",
    ),
    (
        &["insufficient_quota", "quota", "billing"],
        "Claude API quota exceeded. Please check your usage limits or billing information.",
    ),
    (
        &["rate_limit_exceeded", "rate limit"],
        "Claude API rate limit exceeded. Please try again later or upgrade your plan.",
    ),
    (
        &["model_not_found", "does not exist"],
        "Claude model '{model}' not found. Please try a different model.",
    ),
    (
        &["max_tokens", "context_length"],
        "Text is too long for Claude API. Please select shorter text or adjust max tokens.",
    ),
    (
        &["content_filter", "safety"],
        "Content was blocked by Claude safety filters. Please try different text.",
    ),
    (
        &["overloaded", "capacity"],
        "Claude API is currently overloaded. Please try again in a few moments.",
    ),
    (
        &["401", "unauthorized"],
        "Unauthorized access to Claude API. Please check your API key.",
    ),
    (
        &["403", "forbidden"],
        "Access denied to Claude API. Please check your API key permissions.",
    ),
    (
        &["429"],
        "Too many requests to Claude API. Please wait and try again.",
    ),
    (
        &["500", "502", "503"],
        "Claude API is temporarily unavailable. Please try again later.",
    ),
];

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<MessageParam<'a>>,
    temperature: f64,
    top_p: f64,
    top_k: u32,
}

#[derive(Debug, Serialize)]
struct MessageParam<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TokenUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Anthropic Messages adapter.
pub struct ClaudeService {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    engine: RequestEngine,
    limiter: RateLimiter,
}

impl ClaudeService {
    pub fn new(api_key: String, max_tokens: u32) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: models::CLAUDE_3_5_SONNET.to_string(),
            max_tokens,
            engine: RequestEngine::new(),
            limiter: RateLimiter::preset(ServiceKind::Claude, Tier::Free),
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
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key).ok()?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        Some(headers)
    }

    fn parse_success(&self, body: &str) -> GenerationResult {
        match serde_json::from_str::<MessagesResponse>(body) {
            Ok(data) => {
                let content = data
                    .content
                    .into_iter()
                    .next()
                    .map(|block| block.text.trim().to_string())
                    .filter(|content| !content.is_empty());
                match content {
                    Some(content) => {
                        let tokens = data
                            .usage
                            .map(|usage| usage.input_tokens + usage.output_tokens);
                        GenerationResult::success(content, tokens)
                    }
                    None => GenerationResult::failure("No response generated from Claude"),
                }
            }
            Err(err) => self.failure_for(&err.to_string()),
        }
    }

    fn failure_for(&self, raw: &str) -> GenerationResult {
        debug!(service = "claude", error = raw, "mapping failure");
        let message = catalog_lookup(FAILURE_CATALOG, raw, &self.model)
            .unwrap_or_else(|| format!("Claude API error: {raw}"));
        GenerationResult::failure(message)
    }
}

#[async_trait]
impl AiService for ClaudeService {
    async fn generate_text(&self, prompt: &str) -> GenerationResult {
        if !self.validate_api_key() {
            return GenerationResult::failure("Invalid Claude API key");
        }
        let Some(headers) = self.request_headers() else {
            return GenerationResult::failure("Invalid Claude API key");
        };

        self.limiter.acquire().await;

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![MessageParam {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
        };
        let body = match serde_json::to_value(&body) {
            Ok(value) => value,
            Err(err) => return self.failure_for(&err.to_string()),
        };
        let request = EngineRequest {
            url: format!("{}/messages", self.base_url),
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
        ServiceKind::Claude.validate_key(&self.api_key)
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn service_name(&self) -> &'static str {
        "Anthropic Claude"
    }

    fn available_models(&self) -> &'static [&'static str] {
        models::ALL
    }

    fn switch_model(&mut self, model: &str) -> Result<(), Error> {
        if !models::ALL.contains(&model) {
            return Err(Error::UnsupportedModel(format!(
                "Unsupported Claude model: {model}. Available models: {}",
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
            .unwrap_or((200_000, 0.003));
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
