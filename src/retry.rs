//! Capped exponential backoff for transient failures

use crate::config::RetryConfig;
use crate::error::EngineError;
use crate::telemetry::{self, CounterMetric};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;

/// Hard ceiling on a single backoff delay
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(15);

/// Backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    /// Never above [`MAX_RETRY_DELAY`]
    pub max_delay: Duration,
    /// Total attempts, first try included
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), MAX_RETRY_DELAY, 5)
    }
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.min(MAX_RETRY_DELAY),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.max_attempts,
        )
    }

    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 1)
    }

    /// Delay before retry number `retry` (zero-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    /// Failed with an error not worth retrying
    #[error("{0}")]
    Fatal(E),
    #[error("Cancelled")]
    Cancelled,
}

impl From<RetryError<EngineError>> for EngineError {
    fn from(err: RetryError<EngineError>) -> Self {
        match err {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Fatal(e) => e,
            RetryError::Cancelled => EngineError::Cancelled,
        }
    }
}

/// Run `op` until it succeeds, fails fatally, runs out of attempts or is
/// cancelled
///
/// `cancel` flips to `true` to abandon the loop; a dropped sender means
/// the caller can no longer cancel.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    cancel: Option<&watch::Receiver<bool>>,
    is_retryable: R,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        if is_cancelled(cancel) {
            return Err(RetryError::Cancelled);
        }
        attempt += 1;

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !is_retryable(&err) {
            return Err(RetryError::Fatal(err));
        }
        if attempt >= policy.max_attempts {
            tracing::warn!(attempts = attempt, error = %err, "Retry attempts exhausted");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient failure, backing off"
        );
        telemetry::increment(CounterMetric::RetryAttempts, "transient");

        match cancel {
            Some(rx) => {
                let mut rx = rx.clone();
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = cancelled(&mut rx) => return Err(RetryError::Cancelled),
                }
            }
            None => sleep(delay).await,
        }
        delay = (delay * 2).min(policy.max_delay);
    }
}

fn is_cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.is_some_and(|rx| *rx.borrow())
}

/// Resolves once the flag reads `true`
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
