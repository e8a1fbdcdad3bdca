use std::time::Duration;

use crate::store::StoreError;

/// Decides whether and when a failed object download is attempted again.
pub trait RetryPolicy: Send + Sync + 'static {
    /// Delay before the next attempt after `attempt` (1-based) failed with
    /// `error`, or `None` to give up and surface `error`.
    fn next_delay(&self, attempt: u32, error: &StoreError) -> Option<Duration>;
}

/// Fixed pause between a bounded number of attempts.
///
/// Not-found and transient failures are retried alike: a freshly written
/// object may not be visible to readers yet.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl FixedDelay {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(20))
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&self, attempt: u32, error: &StoreError) -> Option<Duration> {
        if matches!(error, StoreError::InvalidConfig(_)) || attempt >= self.max_attempts {
            return None;
        }
        Some(self.delay)
    }
}
