//! Bounded retry with a fixed inter-attempt delay.
//!
//! Used by generator implementations to wrap a single provider call. The
//! delay is only slept between failed attempts; the last failure is returned
//! immediately. Cancellation interrupts both the in-flight attempt and the
//! sleep.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::AppError;

/// Number of attempts and the pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, AppError> {
        if max_attempts == 0 {
            return Err(AppError::ConfigError(
                "Retry policy needs at least one attempt".into(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    /// Single attempt, no delay.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Read the policy from environment variables.
    ///
    /// - `FIREPLACE_MAX_ATTEMPTS` (optional, defaults to 3)
    /// - `FIREPLACE_RETRY_DELAY_MS` (optional, defaults to 1000)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let max_attempts = match lookup("FIREPLACE_MAX_ATTEMPTS") {
            None => defaults.max_attempts,
            Some(raw) => raw.parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid FIREPLACE_MAX_ATTEMPTS '{raw}': must be a positive integer"
                ))
            })?,
        };

        let delay = match lookup("FIREPLACE_RETRY_DELAY_MS") {
            None => defaults.delay,
            Some(raw) => {
                let ms: u64 = raw.parse().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid FIREPLACE_RETRY_DELAY_MS '{raw}': must be a non-negative integer"
                    ))
                })?;
                Duration::from_millis(ms)
            }
        };

        Self::new(max_attempts, delay)
    }

    /// Run `op` until it succeeds or the attempts are exhausted.
    ///
    /// `op` receives the 1-based attempt number. Returns the last error on
    /// exhaustion, or [`AppError::Cancelled`] as soon as `cancel` fires.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, AppError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let result = tokio::select! {
                r = op(attempt) => r,
                () = cancel.cancelled() => return Err(AppError::Cancelled),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => e,
            };

            if attempt >= self.max_attempts {
                tracing::warn!(attempts = attempt, error = %err, "Retries exhausted");
                return Err(err);
            }

            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = %self.delay.as_millis(),
                error = %err,
                "Attempt failed, retrying"
            );

            tokio::select! {
                () = tokio::time::sleep(self.delay) => {}
                () = cancel.cancelled() => return Err(AppError::Cancelled),
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 1 second apart.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}
