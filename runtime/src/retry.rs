//! Retry with exponential backoff around effect-provider calls.
//!
//! Middleware and requests call providers (RPC nodes, price feeds) that fail
//! transiently. Wrapping the call in [`retry`] keeps that policy out of the
//! closures themselves; only errors that report themselves as transient are
//! retried, everything else surfaces on the first attempt.
//!
//! # Example
//!
//! ```
//! use automata_core::EffectError;
//! use automata_runtime::retry::{RetryPolicy, retry};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<u64, EffectError> {
//! let policy = RetryPolicy::default()
//!     .with_max_retries(5)
//!     .with_initial_delay(Duration::from_millis(50));
//!
//! let balance = retry(&policy, || async {
//!     // provider.fetch_balance(address).await
//!     Ok::<_, EffectError>(42)
//! })
//! .await?;
//! # Ok(balance)
//! # }
//! ```

use crate::metrics::EngineMetrics;
use automata_core::EffectError;
use std::future::Future;
use std::time::Duration;

/// Backoff schedule for retried provider calls.
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `initial_delay`: 100ms
/// - `max_delay`: 5 seconds
/// - `multiplier`: 2.0
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::default().with_max_retries(0)
    }

    /// Set the number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before retry number `retry` (zero-based).
    ///
    /// `initial_delay * multiplier^retry`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        if !factor.is_finite() || factor < 0.0 {
            return self.max_delay;
        }
        let seconds = self.initial_delay.as_secs_f64() * factor;
        if seconds >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(seconds)
        }
    }
}

/// Run a provider call, retrying transient [`EffectError`]s.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient error once
/// `max_retries` is exhausted.
pub async fn retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T, EffectError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EffectError>>,
{
    retry_if(policy, operation, EffectError::is_transient).await
}

/// Run a fallible call, retrying errors for which `is_retryable` holds.
///
/// # Errors
///
/// Returns the first error `is_retryable` rejects, or the last error once
/// `max_retries` is exhausted.
#[tracing::instrument(skip_all, fields(max_retries = policy.max_retries))]
pub async fn retry_if<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut retries = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::debug!(retries, "Provider call succeeded after retry");
                }
                return Ok(value);
            },
            Err(error) if !is_retryable(&error) => {
                tracing::debug!(error = %error, "Provider error is not retryable");
                return Err(error);
            },
            Err(error) if retries >= policy.max_retries => {
                tracing::warn!(retries, error = %error, "Provider call failed after last retry");
                EngineMetrics::retry_exhausted();
                return Err(error);
            },
            Err(error) => {
                let delay = policy.delay_for(retries);
                tracing::debug!(
                    retry = retries + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Provider call failed, retrying"
                );
                EngineMetrics::retry_attempted();
                tokio::time::sleep(delay).await;
                retries += 1;
            },
        }
    }
}
