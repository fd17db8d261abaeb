/*
[INPUT]:  An executor, an ApiRequest and retry configuration
[OUTPUT]: First successful response, or the last classified error
[POS]:    HTTP layer - bounded retry with exponential backoff and jitter
[UPDATE]: When changing retry classification, delays or cancellation
*/

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{NowPaymentsError, Result};

use super::executor::{ApiRequest, Execute, RawResponse};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(8000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// Wraps an executor with bounded retries.
///
/// Only `Network` errors and `Api` errors with status 429/500/502/503/504
/// are retried. The delay after attempt `n` is
/// `min(max_delay, base_delay * 2^(n-1))` plus jitter in `[0, base_delay)`,
/// unless the server sent a retry-after hint, which wins (capped at
/// `max_delay`). Sleeps race the cancellation token; once it fires no
/// further attempt is issued.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    cancel: CancellationToken,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self::with_cancellation(config, CancellationToken::new())
    }

    pub fn with_cancellation(config: RetryConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Exponential part of the delay after the given 1-based attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.config
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay)
    }

    fn jitter(&self) -> Duration {
        let base_ms = self.config.base_delay.as_millis() as u64;
        if base_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..base_ms))
    }

    /// Delay to wait before the attempt following `attempt`
    pub fn delay_for(&self, attempt: u32, err: &NowPaymentsError) -> Duration {
        match err.retry_after() {
            Some(hint) => hint.min(self.config.max_delay),
            None => self.backoff_delay(attempt) + self.jitter(),
        }
    }

    pub async fn execute_with_retry<E>(&self, executor: &E, request: &ApiRequest) -> Result<RawResponse>
    where
        E: Execute + ?Sized,
    {
        if self.cancel.is_cancelled() {
            return Err(NowPaymentsError::network("client is shut down"));
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            let err = match executor.execute(request).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(
                    path = %request.path,
                    attempts = attempt,
                    error = %err,
                    "retries exhausted"
                );
                return Err(err);
            }

            let delay = self.delay_for(attempt, &err);
            warn!(
                path = %request.path,
                attempt,
                max_attempts,
                ?delay,
                error = %err,
                "request failed; retrying with backoff"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(path = %request.path, "retry cancelled by shutdown");
                    return Err(err);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}
