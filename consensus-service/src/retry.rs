use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Retry budget shared by the search and LLM clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// No retries and no waiting, for tests
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Equal jitter backoff: base/2 + rand(0, base/2), base doubling per attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as u64 * 2u64.saturating_pow(attempt);
        let half = base / 2;
        let jitter = if half == 0 {
            0
        } else {
            rand::random_range(0..half)
        };
        Duration::from_millis(half + jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_INITIAL_BACKOFF)
    }
}
