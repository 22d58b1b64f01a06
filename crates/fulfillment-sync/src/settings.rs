//! Batch execution settings.

use std::time::Duration;

/// Limits shared by bulk operations and provider syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Orders in flight at once within one batch.
    pub concurrency: usize,

    /// Provider calls per order before a transient failure is final.
    pub max_attempts: u32,

    /// Deadline for a single provider call.
    pub attempt_timeout: Duration,

    /// Base delay between attempts; attempt `n` waits `n` times this.
    pub retry_backoff: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_attempts: 3,
            attempt_timeout: Duration::from_millis(5000),
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl SyncSettings {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Delay before retrying after failed attempt number `attempt`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.retry_backoff * attempt
    }
}
