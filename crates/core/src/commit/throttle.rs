//! Pacing between mutation calls.
//!
//! The committer calls [`Throttle::before_call`] right before it issues a
//! mutation and [`Throttle::after_call`] once the call has returned,
//! whatever the outcome. Items that never reach the store touch neither hook.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default pause after each mutation call.
pub const DEFAULT_COMMIT_DELAY: Duration = Duration::from_secs(6);

#[async_trait]
pub trait Throttle: Send + Sync {
    async fn before_call(&self) {}

    async fn after_call(&self) {}
}

/// Sleep a fixed delay after every issued call.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(DEFAULT_COMMIT_DELAY)
    }
}

#[async_trait]
impl Throttle for FixedDelay {
    async fn after_call(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// Keep issued calls at least `min_interval` apart, waiting only for the
/// part of the interval that has not already elapsed.
#[derive(Debug)]
pub struct MinInterval {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl MinInterval {
    pub fn new(min_interval: Duration) -> Self {
        Self { last_call: Mutex::new(None), min_interval }
    }
}

#[async_trait]
impl Throttle for MinInterval {
    async fn before_call(&self) {
        let last = *self.last_call.lock().await;
        if let Some(previous) = last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
    }

    // Stamped once the call has been issued; a mutator that reports
    // `Unchanged` never reaches this hook.
    async fn after_call(&self) {
        *self.last_call.lock().await = Some(Instant::now());
    }
}

/// No pacing. For dry runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unthrottled;

#[async_trait]
impl Throttle for Unthrottled {}
