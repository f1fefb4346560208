use std::time::Duration;

/// How a failed write is retried.
///
/// `max_retries: None` keeps retrying forever; the delay doubles from
/// `initial_delay` up to `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.clone())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Maximum retry attempts exceeded ({attempts})")]
pub struct MaxRetriesExceeded {
    pub attempts: u32,
}

#[derive(Debug)]
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    current_attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt, or an error once the limit is reached
    pub fn next_delay(&mut self) -> Result<Duration, MaxRetriesExceeded> {
        if let Some(limit) = self.policy.max_retries {
            if self.current_attempt >= limit {
                return Err(MaxRetriesExceeded {
                    attempts: self.current_attempt,
                });
            }
        }

        let factor = 2u32.saturating_pow(self.current_attempt.min(31));
        let delay = self
            .policy
            .initial_delay
            .saturating_mul(factor)
            .min(self.policy.max_delay);

        self.current_attempt = self.current_attempt.saturating_add(1);
        Ok(delay)
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }
}
