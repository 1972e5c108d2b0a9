//! Retry controller
//!
//! Wraps one whole delivery attempt (probe, gate, dispatch, decode) rather than a single
//! stream: once the source has failed there is nothing left to resume, so the attempt
//! is re-run from the start.

use crate::config::RetrySettings;
use crate::{Error, Result};
use std::future::Future;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Per-send retry bookkeeping. Discarded when the send terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// 0-based index of the attempt currently running.
    pub attempt: u32,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

/// Successful value plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct RetryController {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Option<Duration>,
}

impl RetryController {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: None,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: settings.max_delay_ms.map(Duration::from_millis),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// `base * 2^attempt`, capped by `max_delay` when set. No jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let mut delay = base.saturating_mul(factor);
        if let Some(cap) = self.max_delay {
            delay = delay.min(cap.as_millis() as u64);
        }
        Duration::from_millis(delay)
    }

    pub async fn with_retry<T, F, Fut, C>(&self, attempt_fn: F, classify: C) -> Result<Retried<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&Error) -> bool,
    {
        self.with_retry_notify(attempt_fn, classify, |_, _, _| {})
            .await
    }

    /// Like [`with_retry`](Self::with_retry), calling `notify` before each backoff sleep.
    pub async fn with_retry_notify<T, F, Fut, C, N>(
        &self,
        mut attempt_fn: F,
        classify: C,
        mut notify: N,
    ) -> Result<Retried<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&Error) -> bool,
        N: FnMut(&RetryState, Duration, &Error),
    {
        let mut state = RetryState {
            attempt: 0,
            max_attempts: self.max_retries.saturating_add(1),
            base_delay_ms: self.base_delay.as_millis() as u64,
        };

        loop {
            match attempt_fn(state.attempt).await {
                Ok(value) => {
                    return Ok(Retried {
                        value,
                        attempts: state.attempt + 1,
                    })
                }
                Err(err) => {
                    if !classify(&err) {
                        debug!(attempt = state.attempt, error = %err, "terminal failure, not retrying");
                        return Err(err);
                    }
                    if state.attempt >= self.max_retries {
                        warn!(attempts = state.attempt + 1, error = %err, "retries exhausted");
                        return Err(Error::RetriesExhausted {
                            attempts: state.attempt + 1,
                            source: Box::new(err),
                        });
                    }
                    let delay = self.backoff(state.attempt);
                    warn!(
                        attempt = state.attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retryable failure, backing off"
                    );
                    notify(&state, delay, &err);
                    tokio::time::sleep(delay).await;
                    state.attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryController {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}
