// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry with exponential backoff and jitter
//!
//! `retry` drives an operation until it succeeds, fails permanently, runs out
//! of attempts, or runs out of wall-clock budget. Each attempt is individually
//! bounded by `attempt_timeout`; an attempt that times out counts as transient.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Retry configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Cap on any single delay
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Fraction of each delay randomized in either direction (0.0 to 1.0)
    pub jitter: f64,
    /// Wall-clock budget for all attempts and delays together
    #[serde(with = "humantime_serde")]
    pub budget: Duration,
    /// Deadline for a single attempt
    #[serde(with = "humantime_serde")]
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
            budget: Duration::from_secs(300),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Un-jittered delay before retry number `retry` (0-indexed)
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = delay.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Delay before retry number `retry` with jitter applied, never above `max_backoff`
    pub fn jittered_delay(&self, retry: u32, rng: &mut impl Rng) -> Duration {
        let base = self.backoff_delay(retry).as_secs_f64();
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base == 0.0 {
            return Duration::from_secs_f64(base);
        }
        let factor = 1.0 + rng.random_range(-jitter..=jitter);
        let jittered = (base * factor).min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Errors that know whether another attempt could help
pub trait Retryable {
    fn is_transient(&self) -> bool;

    /// The error recorded when an attempt exceeds its deadline
    fn attempt_timed_out(timeout: Duration) -> Self;
}

/// Why `retry` stopped without a result
#[derive(Debug, Error, PartialEq)]
pub enum RetryError<E> {
    #[error("{0}")]
    Permanent(E),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    #[error("retry budget of {budget:?} exceeded after {attempts} attempts")]
    BudgetExceeded {
        attempts: u32,
        budget: Duration,
        last: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// Whether retries were cut short by attempts or budget rather than a permanent error
    pub fn is_exhaustion(&self) -> bool {
        !matches!(self, RetryError::Permanent(_))
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent(_) => 1,
            RetryError::Exhausted { attempts, .. } | RetryError::BudgetExceeded { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Permanent(e) | RetryError::Exhausted { last: e, .. } => Some(e),
            RetryError::BudgetExceeded { last, .. } => last.as_ref(),
        }
    }
}

/// Run `op` under `policy`
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let deadline = Instant::now() + policy.budget;
    let max_attempts = policy.max_attempts.max(1);
    let mut last: Option<E> = None;
    let mut attempt = 0;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(RetryError::BudgetExceeded {
                attempts: attempt,
                budget: policy.budget,
                last,
            });
        }
        attempt += 1;

        let per_attempt = policy.attempt_timeout.min(remaining);
        let result = match tokio::time::timeout(per_attempt, op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(E::attempt_timed_out(per_attempt)),
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryError::Permanent(e)),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        let delay = policy.jittered_delay(attempt - 1, &mut rand::rng());
        if Instant::now() + delay >= deadline {
            return Err(RetryError::BudgetExceeded {
                attempts: attempt,
                budget: policy.budget,
                last: Some(error),
            });
        }

        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "transient failure, retrying"
        );
        last = Some(error);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
