//! # Retry Policy
//!
//! How many times a queued action is dispatched before it is dropped, and how
//! long the engine waits before draining again after a failed pass.
//!
//! The attempt ceiling counts dispatches, not passes: an action that fails
//! `max_attempts` times is removed after exactly that many attempts.

use crate::shared::config::EngineConfig;
use std::time::Duration;

/// Attempt ceiling and backoff for the action queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Dispatch attempts before an action is dropped
    pub max_attempts: u32,
    /// Re-drain delay after the first failure; doubles per attempt
    pub base_delay: Duration,
    /// Upper bound on the re-drain delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.retry_base_delay,
            max_delay: config.retry_max_delay,
        }
    }

    /// Whether an action with `attempts` failed dispatches must be dropped
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Delay before the next pass, given the failed attempts of the queue head
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent).min(self.max_delay)
    }
}
