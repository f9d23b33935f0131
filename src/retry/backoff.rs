//! Exponential backoff with jitter
//!
//! Stateful backoff counter for retry loops, plus parsing of HTTP
//! `Retry-After` headers in both delta-seconds and HTTP-date form.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

/// Tracks retry attempts and sleeps an exponentially growing delay
/// between them.
///
/// Delays double per attempt from `base_delay` up to `max_delay`, with
/// up to 10% random jitter added on top of the capped value to spread
/// out synchronized retries.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    use_jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000), Duration::from_millis(30_000))
    }
}

impl ExponentialBackoff {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            base_delay,
            max_delay,
            use_jitter: true,
        }
    }

    /// Enables or disables jitter. Disabled jitter makes delays
    /// deterministic, which tests rely on.
    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Whether another attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Attempts left before exhaustion.
    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt)
    }

    /// Delay for a given zero-based attempt number.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64;
        let capped = (base * 2f64.powi(attempt as i32)).min(self.max_delay.as_millis() as f64);
        let jitter = if self.use_jitter {
            rand::thread_rng().gen_range(0.0..0.1) * capped
        } else {
            0.0
        };
        Duration::from_millis((capped + jitter) as u64)
    }

    /// Delay that the next [`wait`](Self::wait) call would sleep.
    pub fn delay(&self) -> Duration {
        self.delay_for(self.attempt)
    }

    /// Sleeps the current delay and consumes one attempt.
    ///
    /// Returns `false` without sleeping once attempts are exhausted.
    pub async fn wait(&mut self) -> bool {
        if !self.can_retry() {
            return false;
        }
        tokio::time::sleep(self.delay()).await;
        self.attempt += 1;
        true
    }

    /// Restarts the attempt counter, e.g. after a successful request.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Parses an HTTP `Retry-After` header value into a wait duration.
///
/// Accepts delta-seconds (`"5"`) and HTTP-date (RFC 2822) forms. Dates
/// in the past and unparseable values map to zero.
pub fn parse_retry_after(value: &str) -> Duration {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Duration::from_secs(secs);
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return date
            .signed_duration_since(Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
    }
    Duration::ZERO
}
