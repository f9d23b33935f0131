//! Retry and pacing primitives
//!
//! [`ExponentialBackoff`] spaces out retries of a failing call,
//! [`RateLimiter`] paces requests to stay inside provider quotas, and
//! [`parse_retry_after`] turns server hints into concrete waits.

pub mod backoff;
pub mod rate_limiter;

pub use backoff::{parse_retry_after, ExponentialBackoff};
pub use rate_limiter::{RateLimitConfig, RateLimitDecision, RateLimitStatus, RateLimiter, Tier};
