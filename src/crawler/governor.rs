//! Rate limit and retry policy
//!
//! Every sleep the crawler takes is decided here:
//!
//! | Signal | Action |
//! |--------|--------|
//! | remaining quota below the low-water mark | short preemptive pause |
//! | rate limit (403 with message, 429, `RATE_LIMITED`) | long fixed pause, bounded retries |
//! | 5xx or network failure | exponential backoff, bounded retries |
//! | authentication failure | never consulted; fatal |

use crate::config::RateLimitConfig;
use std::time::Duration;

/// Recoverable failure classes the governor knows how to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoverableKind {
    RateLimited,
    ServerError,
    Network,
}

/// Whether to try again, and how long to wait first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    fn give_up() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }

    fn after(delay: Duration) -> Self {
        Self { retry: true, delay }
    }
}

/// Stateless retry and throttling policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitGovernor {
    low_water_mark: u32,
    preemptive_pause: Duration,
    rate_limit_pause: Duration,
    max_rate_limit_retries: u32,
    max_server_retries: u32,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
}

impl RateLimitGovernor {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            low_water_mark: config.low_water_mark,
            preemptive_pause: Duration::from_millis(config.preemptive_pause_ms),
            rate_limit_pause: Duration::from_secs(config.rate_limit_pause_secs),
            max_rate_limit_retries: config.max_rate_limit_retries,
            max_server_retries: config.max_server_retries,
            backoff_base_ms: config.backoff_base_ms,
            backoff_max_ms: config.backoff_max_ms,
        }
    }

    /// Advisory pause after a successful response
    ///
    /// # Arguments
    ///
    /// * `remaining` - Remaining quota reported by the platform, if any
    ///
    /// # Returns
    ///
    /// * `Some(Duration)` - Quota is below the low-water mark
    /// * `None` - No throttling needed
    pub fn on_response(&self, remaining: Option<u32>) -> Option<Duration> {
        match remaining {
            Some(r) if r < self.low_water_mark => Some(self.preemptive_pause),
            _ => None,
        }
    }

    /// Decides what to do after the `attempt`-th consecutive recoverable failure
    ///
    /// `attempt` starts at 1 for the first failure of a request.
    pub fn on_recoverable_error(&self, kind: RecoverableKind, attempt: u32) -> RetryDecision {
        if attempt == 0 || attempt > self.max_retries(kind) {
            return RetryDecision::give_up();
        }

        match kind {
            RecoverableKind::RateLimited => RetryDecision::after(self.rate_limit_pause),
            RecoverableKind::ServerError | RecoverableKind::Network => {
                RetryDecision::after(self.backoff(attempt))
            }
        }
    }

    /// Retries granted for a failure class
    pub fn max_retries(&self, kind: RecoverableKind) -> u32 {
        match kind {
            RecoverableKind::RateLimited => self.max_rate_limit_retries,
            RecoverableKind::ServerError | RecoverableKind::Network => self.max_server_retries,
        }
    }

    /// `min(base * 2^(attempt - 1), max)`
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self
            .backoff_base_ms
            .saturating_mul(factor)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

impl Default for RateLimitGovernor {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}
