//! Backoff policy for rejected batches.

use std::time::Duration;

/// Linear backoff: the n-th retry waits `n * backoff_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Resends allowed per batch before the run aborts.
    pub max_retries: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before resend number `retry` (1-based). Saturates at
    /// `Duration::MAX`.
    pub fn delay(&self, retry: u32) -> Duration {
        self.backoff_step.checked_mul(retry).unwrap_or(Duration::MAX)
    }
}

/// Blocking wait between attempts. Swappable so tests don't sleep.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_linearly() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=5).map(|n| policy.delay(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn huge_step_saturates_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_step: Duration::from_secs(u64::MAX / 2 + 1),
        };
        assert_eq!(policy.delay(1), Duration::from_secs(u64::MAX / 2 + 1));
        assert_eq!(policy.delay(2), Duration::MAX);
    }
}
