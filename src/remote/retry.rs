use std::time::Duration;

use crate::{config::RetryConfig, error::TransportError};

/// Bounded exponential backoff for remote requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self::from(&RetryConfig::default()) }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self { max_attempts: 1, initial_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    /// Delay to wait after the given number of failed attempts (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out.
    /// On failure returns the last error together with the number of attempts made.
    pub fn run<T>(
        &self,
        mut op: impl FnMut(u32) -> Result<T, TransportError>,
    ) -> Result<T, (TransportError, u32)> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && err.is_retryable() => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(attempt, max_attempts = self.max_attempts, ?delay, error = %err, "request failed, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err((err, attempt)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, initial_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    #[test]
    fn delays_double_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
        assert_eq!(policy.delay_after(40), Duration::from_millis(350));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = instant(3).run(|_| {
            calls += 1;
            if calls < 3 { Err(TransportError::Status(503)) } else { Ok(calls) }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn exhaustion_reports_attempts() {
        let result: Result<(), _> = instant(3).run(|_| Err(TransportError::Network("reset".into())));
        let (err, attempts) = result.unwrap_err();
        assert_eq!(attempts, 3);
        assert!(matches!(err, TransportError::Network(_)));
    }

    #[test]
    fn non_retryable_fails_immediately() {
        let mut calls = 0;
        let result: Result<(), _> = instant(5).run(|_| {
            calls += 1;
            Err(TransportError::Status(404))
        });
        assert_eq!(result.unwrap_err().1, 1);
        assert_eq!(calls, 1);
    }
}
