//! HTTP request engine
//!
//! One engine instance fronts one provider endpoint. It owns the reqwest
//! client, enforces a minimum interval between completed requests, and
//! runs the shared retry loop: honor `Retry-After` on 429, back off and
//! retry server errors and transient transport failures, and give up
//! immediately on errors that retrying cannot fix.
//!
//! Status handling is deliberately shallow. Responses that survive the
//! retry loop are returned as-is, including non-success ones, so each
//! provider adapter can map its own error payloads to user-facing
//! messages.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::Error;
use crate::retry::parse_retry_after;

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(1000);
const RATE_LIMIT_DELAY_CAP: Duration = Duration::from_millis(30_000);
const SERVER_ERROR_DELAY_CAP: Duration = Duration::from_millis(10_000);
const TRANSPORT_DELAY_CAP: Duration = Duration::from_millis(5_000);

/// One outbound POST request.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

/// A response that survived the retry loop, body already read.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub status: StatusCode,
    pub body: String,
}

impl EngineResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

struct SendState {
    last_request: Option<Instant>,
}

/// Retrying HTTP sender with per-endpoint request spacing.
pub struct RequestEngine {
    client: reqwest::Client,
    min_interval: Duration,
    retry_base: Duration,
    state: Mutex<SendState>,
}

impl Default for RequestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestEngine {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            min_interval: DEFAULT_MIN_INTERVAL,
            retry_base: DEFAULT_RETRY_BASE,
            state: Mutex::new(SendState { last_request: None }),
        }
    }

    /// Sets the minimum spacing between completed requests.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Sets the base unit for exponential retry delays. Tests shrink it
    /// to keep retry scenarios fast.
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    /// Sends a request, retrying transient failures up to three attempts.
    ///
    /// The send lock is held for the whole call, so concurrent callers
    /// serialize and the minimum interval holds between any two requests
    /// that reached the wire.
    ///
    /// Outcomes:
    /// - 429 on the final attempt is an [`Error::Api`]; earlier 429s wait
    ///   for `Retry-After` when present, else exponential backoff.
    /// - 5xx is retried; the final attempt's response is returned as-is.
    /// - Transport errors are retried unless the message marks them
    ///   non-retryable, then surface as [`Error::Network`].
    /// - Any other response is returned immediately.
    pub async fn send(&self, request: EngineRequest) -> Result<EngineResponse, Error> {
        let mut state = self.state.lock().await;

        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "spacing out requests");
                sleep(wait).await;
            }
        }

        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            debug!(url = %request.url, attempt, "sending request");
            let result = self
                .client
                .post(&request.url)
                .headers(request.headers.clone())
                .json(&request.body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt == MAX_ATTEMPTS {
                            return Err(Error::Api(format!(
                                "Rate limit exceeded after {MAX_ATTEMPTS} attempts"
                            )));
                        }
                        let retry_after = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .map(parse_retry_after)
                            .filter(|d| !d.is_zero());
                        let delay = retry_after
                            .unwrap_or_else(|| self.backoff_delay(attempt, RATE_LIMIT_DELAY_CAP));
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "rate limited, retrying"
                        );
                        sleep(delay).await;
                        continue;
                    }

                    if status.is_server_error() && attempt < MAX_ATTEMPTS {
                        let delay = self.backoff_delay(attempt - 1, SERVER_ERROR_DELAY_CAP);
                        warn!(
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "server error, retrying"
                        );
                        sleep(delay).await;
                        continue;
                    }

                    let body = response
                        .text()
                        .await
                        .map_err(|e| Error::Network(format!("Failed to read response body: {e}")))?;
                    debug!(status = status.as_u16(), "response received");
                    state.last_request = Some(Instant::now());
                    return Ok(EngineResponse { status, body });
                }
                Err(err) => {
                    let message = err.to_string();
                    if is_non_retryable(&message) {
                        return Err(Error::Network(message));
                    }
                    warn!(attempt, error = %message, "request failed");
                    last_error = message;
                    if attempt < MAX_ATTEMPTS {
                        sleep(self.backoff_delay(attempt - 1, TRANSPORT_DELAY_CAP)).await;
                    }
                }
            }
        }

        Err(Error::Network(format!(
            "Network request failed after {MAX_ATTEMPTS} attempts: {last_error}"
        )))
    }

    fn backoff_delay(&self, exponent: u32, cap: Duration) -> Duration {
        let base = self.retry_base.as_millis() as u64;
        let millis = base.saturating_mul(2u64.saturating_pow(exponent));
        Duration::from_millis(millis).min(cap)
    }
}

/// Transport errors whose message carries one of these markers will not
/// succeed on retry.
fn is_non_retryable(message: &str) -> bool {
    const MARKERS: &[&str] = &[
        "invalid api key",
        "invalid_api_key",
        "unauthorized",
        "forbidden",
        "invalid request",
        "invalid_request",
        "content filter",
        "content_filter",
        "context length",
        "context_length",
        "model not found",
        "model_not_found",
        "does not exist",
    ];
    let lower = message.to_lowercase();
    MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_engine() -> RequestEngine {
        RequestEngine::new()
            .with_min_interval(Duration::ZERO)
            .with_retry_base(Duration::from_millis(1))
    }

    fn request_to(url: String) -> EngineRequest {
        EngineRequest {
            url,
            headers: HeaderMap::new(),
            body: serde_json::json!({"input": "hello"}),
        }
    }

    #[tokio::test]
    async fn test_success_response_passes_through() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .expect(1)
            .create_async()
            .await;

        let engine = fast_engine();
        let response = engine
            .send(request_to(format!("{}/v1/generate", server.url())))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert!(response.is_success());
        assert_eq!(response.body, r#"{"ok":true}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_returned_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/generate")
            .with_status(400)
            .with_body(r#"{"error":{"message":"bad request"}}"#)
            .expect(1)
            .create_async()
            .await;

        let engine = fast_engine();
        let response = engine
            .send(request_to(format!("{}/v1/generate", server.url())))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(!response.is_success());
        assert!(response.body.contains("bad request"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_all_attempts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/generate")
            .with_status(429)
            .with_body("slow down")
            .expect(3)
            .create_async()
            .await;

        let engine = fast_engine();
        let err = engine
            .send(request_to(format!("{}/v1/generate", server.url())))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::Api("Rate limit exceeded after 3 attempts".to_string())
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_honors_retry_after_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/generate")
            .with_status(429)
            .with_header("retry-after", "1")
            .with_body("slow down")
            .expect(3)
            .create_async()
            .await;

        let engine = fast_engine();
        let start = Instant::now();
        let err = engine
            .send(request_to(format!("{}/v1/generate", server.url())))
            .await
            .unwrap_err();

        // Two waits of one second each before giving up.
        assert!(start.elapsed() >= Duration::from_millis(1900));
        assert!(matches!(err, Error::Api(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_retries_then_returns_final_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/generate")
            .with_status(503)
            .with_body("unavailable")
            .expect(3)
            .create_async()
            .await;

        let engine = fast_engine();
        let response = engine
            .send(request_to(format!("{}/v1/generate", server.url())))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body, "unavailable");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transport_error_exhausts_attempts() {
        // Bind then drop a listener so the port refuses connections.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let engine = fast_engine();
        let err = engine
            .send(request_to(format!("http://127.0.0.1:{port}/v1/generate")))
            .await
            .unwrap_err();

        match err {
            Error::Network(message) => {
                assert!(
                    message.starts_with("Network request failed after 3 attempts:"),
                    "unexpected message: {message}"
                );
            }
            other => panic!("expected Network error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_min_interval_spaces_out_requests() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/generate")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let engine = RequestEngine::new()
            .with_min_interval(Duration::from_millis(150))
            .with_retry_base(Duration::from_millis(1));
        let url = format!("{}/v1/generate", server.url());

        let start = Instant::now();
        engine.send(request_to(url.clone())).await.unwrap();
        engine.send(request_to(url)).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_non_retryable_markers() {
        assert!(is_non_retryable("401 Unauthorized"));
        assert!(is_non_retryable("Invalid API key provided"));
        assert!(is_non_retryable("model_not_found: gpt-5"));
        assert!(is_non_retryable("The model `gpt-2` does not exist"));
        assert!(is_non_retryable("context_length_exceeded"));

        assert!(!is_non_retryable("connection reset by peer"));
        assert!(!is_non_retryable("operation timed out"));
        assert!(!is_non_retryable("dns error"));
    }
}
