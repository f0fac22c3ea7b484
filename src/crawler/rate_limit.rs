//! Request pacing
//!
//! A fixed delay precedes every outbound request. Long comment crawls
//! additionally pause for `factor x delay` after every `every`-th record.
//! Sleeping goes through [`Sleeper`] so the policy can be driven by a fake
//! clock in tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::CrawlerConfig;

/// Something that can wait for a duration
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that records requested waits and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Sum of all requested waits
    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

/// Base delay plus volume-triggered escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub base_delay: Duration,
    pub escalation_every: u64,
    pub escalation_factor: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            escalation_every: 1000,
            escalation_factor: 10,
        }
    }
}

impl RateLimitPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.request_delay_ms),
            escalation_every: config.escalation_every,
            escalation_factor: config.escalation_factor,
        }
    }

    pub fn with_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }

    /// Extra pause owed after the `processed`-th record, if any
    pub fn escalation_after(&self, processed: u64) -> Option<Duration> {
        if processed == 0 || self.escalation_every == 0 || self.base_delay.is_zero() {
            return None;
        }
        (processed % self.escalation_every == 0).then(|| {
            self.base_delay
                .checked_mul(self.escalation_factor)
                .unwrap_or(Duration::MAX)
        })
    }
}

/// Policy object applied by the orchestrator and reply expansion
#[derive(Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: RateLimitPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(RateLimitPolicy::with_delay(Duration::ZERO))
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Wait the base delay before issuing a request
    pub async fn before_request(&self) {
        if !self.policy.base_delay.is_zero() {
            self.sleeper.sleep(self.policy.base_delay).await;
        }
    }

    /// Apply the escalated pause owed after `processed` records
    pub async fn after_record(&self, processed: u64) {
        if let Some(pause) = self.policy.escalation_after(processed) {
            tracing::info!(processed, pause_ms = pause.as_millis() as u64, "Escalated pause");
            self.sleeper.sleep(pause).await;
        }
    }
}
