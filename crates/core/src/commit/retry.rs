//! Bounded exponential backoff for transient store failures.
//!
//! Only [`StoreErrorKind::Transient`] is ever retried. Locked pages, missing
//! pages and permission failures are final on the first attempt. With
//! `max_retries == 0` every failure is final.

use std::time::Duration;

use crate::store::StoreError;

/// Backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Cap for exponential growth.
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// No retries.
    pub const NONE: Self = Self {
        max_retries: 0,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(60),
        backoff_multiplier: 2.0,
    };

    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self { max_retries, initial_delay, ..Self::NONE }
    }

    /// Delay before retry number `attempt` (0-indexed): `initial * multiplier^attempt`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// The delay to wait before retrying after `attempt` failed retries, or
    /// `None` when `err` is final.
    pub fn next_delay(&self, err: &StoreError, attempt: u32) -> Option<Duration> {
        (err.kind.is_transient() && attempt < self.max_retries).then(|| self.delay_for_attempt(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}
