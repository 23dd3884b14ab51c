//! How failed remote calls are retried.

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;

/// Retry policy for a turn's remote call.
///
/// A failed attempt `k` (counting from 0) is retried after
/// `initial_delay * multiplier^k`, capped at `max_delay`, for at most
/// `max_retries` retries. With the defaults this gives waits of 1s, 2s, 4s,
/// 8s and 16s, six attempts in total.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Upper bound of a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(16),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first failure.
    #[inline]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub(crate) fn delays(&self) -> RetryDelays {
        let mut backoff = ExponentialBackoff {
            current_interval: self.initial_delay,
            initial_interval: self.initial_delay,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        backoff.reset();
        RetryDelays {
            backoff,
            remaining: self.max_retries,
        }
    }
}

/// The delays of one turn, consumed as attempts fail.
pub(crate) struct RetryDelays {
    backoff: ExponentialBackoff,
    remaining: u32,
}

impl RetryDelays {
    /// Returns the wait before the next attempt, or `None` once retries are
    /// exhausted. Delays are whole milliseconds.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        let delay = self.backoff.next_backoff()?;
        self.remaining -= 1;
        Some(Duration::from_millis(delay.as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(policy: RetryPolicy) -> Vec<Duration> {
        let mut delays = policy.delays();
        std::iter::from_fn(|| delays.next_delay()).collect()
    }

    #[test]
    fn test_default_schedule() {
        let secs: Vec<u64> = collect(RetryPolicy::default())
            .iter()
            .map(Duration::as_secs)
            .collect();
        assert_eq!(secs, [1, 2, 4, 8, 16]);
    }

    #[test]
    fn test_capped_schedule() {
        let policy = RetryPolicy {
            max_retries: 7,
            max_delay: Duration::from_secs(5),
            ..RetryPolicy::default()
        };
        let millis: Vec<u128> =
            collect(policy).iter().map(Duration::as_millis).collect();
        assert_eq!(millis, [1000, 2000, 4000, 5000, 5000, 5000, 5000]);
    }

    #[test]
    fn test_no_retry() {
        assert!(collect(RetryPolicy::no_retry()).is_empty());
    }
}
