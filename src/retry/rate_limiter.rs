//! Sliding-window rate limiter
//!
//! Client-side request pacing per provider. Each limiter tracks request
//! timestamps inside a sliding window and computes how long a caller
//! must wait once the window is full. Preset limits mirror the
//! published per-tier quotas of each provider.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::types::ServiceKind;

/// Limits for one sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed inside one window
    pub requests_per_minute: usize,
    /// Window length, one minute unless overridden
    pub window: Duration,
}

impl RateLimitConfig {
    pub const fn new(requests_per_minute: usize) -> Self {
        Self {
            requests_per_minute,
            window: Duration::from_secs(60),
        }
    }

    /// Overrides the window length. Tests shrink it to keep runtimes low.
    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

/// Whether a request may proceed now, and if not, for how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub can_proceed: bool,
    pub wait_time: Duration,
}

/// Snapshot of a limiter's window, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub requests_in_window: usize,
    pub max_requests: usize,
    /// Time until the oldest tracked request leaves the window
    pub reset_after: Duration,
}

/// Subscription tier a provider key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Free,
    Paid,
}

/// Sliding-window request limiter.
pub struct RateLimiter {
    name: String,
    config: RateLimitConfig,
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Self {
        Self {
            name: name.into(),
            config,
            requests: Mutex::new(VecDeque::new()),
        }
    }

    /// Limiter preconfigured with a provider's published per-tier quota.
    pub fn preset(kind: ServiceKind, tier: Tier) -> Self {
        let display = match kind {
            ServiceKind::OpenAi => "OpenAI",
            ServiceKind::Gemini => "Gemini",
            ServiceKind::Claude => "Claude",
        };
        let requests_per_minute = match (kind, tier) {
            (ServiceKind::OpenAi, Tier::Free) => 3,
            (ServiceKind::OpenAi, Tier::Paid) => 60,
            (ServiceKind::Claude, Tier::Free) => 5,
            (ServiceKind::Claude, Tier::Paid) => 100,
            (ServiceKind::Gemini, Tier::Free) => 15,
            (ServiceKind::Gemini, Tier::Paid) => 300,
        };
        let suffix = match tier {
            Tier::Free => "Free",
            Tier::Paid => "Paid",
        };
        Self::new(
            format!("{display}-{suffix}"),
            RateLimitConfig::new(requests_per_minute),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn prune(requests: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while requests
            .front()
            .is_some_and(|&t| now.duration_since(t) >= window)
        {
            requests.pop_front();
        }
    }

    /// Checks whether a request may proceed right now.
    ///
    /// Expired entries are pruned first; when the window is full the
    /// returned wait time is how long until the oldest entry expires.
    pub async fn check(&self) -> RateLimitDecision {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();
        Self::prune(&mut requests, self.config.window, now);

        if requests.len() < self.config.requests_per_minute {
            return RateLimitDecision {
                can_proceed: true,
                wait_time: Duration::ZERO,
            };
        }

        let wait_time = requests
            .front()
            .map(|&oldest| (oldest + self.config.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        RateLimitDecision {
            can_proceed: false,
            wait_time,
        }
    }

    /// Waits until the window has room, then records the request.
    ///
    /// The request is recorded unconditionally after the wait; callers
    /// that called `acquire` are assumed to send immediately.
    pub async fn acquire(&self) {
        let decision = self.check().await;
        if !decision.can_proceed && decision.wait_time > Duration::ZERO {
            debug!(
                limiter = %self.name,
                wait_ms = decision.wait_time.as_millis() as u64,
                "rate limit reached, waiting"
            );
            tokio::time::sleep(decision.wait_time).await;
        }
        let mut requests = self.requests.lock().await;
        requests.push_back(Instant::now());
    }

    /// Current window occupancy.
    pub async fn status(&self) -> RateLimitStatus {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();
        Self::prune(&mut requests, self.config.window, now);

        let reset_after = requests
            .front()
            .map(|&oldest| (oldest + self.config.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        RateLimitStatus {
            requests_in_window: requests.len(),
            max_requests: self.config.requests_per_minute,
            reset_after,
        }
    }

    /// Forgets all tracked requests.
    pub async fn reset(&self) {
        self.requests.lock().await.clear();
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
