//! Catalog retry logic
//!
//! Retries transient catalog failures (network errors, 429, 5xx) with
//! exponential backoff. Anything else is returned on the first attempt so the
//! caller can apply its per-kind policy (skip the track or abort the run).
//!
//! **Backoff Strategy:**
//! - Delay before retry `n` (0-based): `initial_backoff * 2^n`, capped at `max_backoff`
//! - A server `Retry-After` replaces the computed delay, capped at `max_retry_after`
//! - Sleeps race the run's cancellation token

use super::catalog_client::CatalogError;
use datafy_common::config::CatalogConfig;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_retry_after: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            max_retry_after: Duration::from_secs(config.max_retry_after_secs),
        }
    }

    /// Computed backoff before retry number `retry` (0-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_backoff)
    }

    /// Delay before the next attempt after `error`
    pub fn delay_for(&self, error: &CatalogError, retry: u32) -> Duration {
        match error.retry_after() {
            Some(retry_after) => retry_after.min(self.max_retry_after),
            None => self.backoff(retry),
        }
    }

    /// Run `operation`, retrying transient failures
    ///
    /// Returns `CatalogError::Cancelled` as soon as `cancel` fires, including
    /// while waiting out a backoff.
    pub async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, CatalogError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let mut retry = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(CatalogError::Cancelled);
            }

            match operation().await {
                Ok(value) => {
                    if retry > 0 {
                        tracing::debug!(
                            operation = operation_name,
                            retries = retry,
                            "Catalog request succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && retry < self.max_retries => {
                    let delay = self.delay_for(&err, retry);
                    tracing::warn!(
                        operation = operation_name,
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient catalog failure, retrying"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(CatalogError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    retry += 1;
                }
                Err(err) => {
                    if retry > 0 {
                        tracing::warn!(
                            operation = operation_name,
                            retries = retry,
                            error = %err,
                            "Catalog request failed after retries"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CatalogConfig::default())
    }
}
