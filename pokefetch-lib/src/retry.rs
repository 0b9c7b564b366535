//! Single-request reliability on top of a [`Fetch`] implementation.
//!
//! [`RetryingClient`] repeats an attempt until it succeeds, the server says
//! no in a way that won't change, or the attempt budget is used up:
//!
//! | outcome                          | action                                       |
//! |----------------------------------|----------------------------------------------|
//! | `200 OK`                         | return the payload                           |
//! | `429 Too Many Requests`          | wait `Retry-After` (1s if absent), retry     |
//! | `500`, `503`                     | wait `backoff_factor ^ attempt` seconds      |
//! | connection error or timeout      | wait `backoff_factor ^ attempt` seconds      |
//! | any other status                 | give up immediately                          |
//! | any other transport error        | give up immediately                          |
//!
//! `attempt` counts the failed attempts before the current one, so the first
//! backoff is one second. There is no wait after the last permitted attempt.

use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ErrorKind, Fetch, FetchOutcome, FetchTarget, Result};

/// Default number of attempts per call, 5.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default base of the exponential backoff, 2.
pub const DEFAULT_BACKOFF_FACTOR: u32 = 2;

/// Wait time after a `429` without a usable `Retry-After` header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts per call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff in seconds
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

const fn default_backoff_factor() -> u32 {
    DEFAULT_BACKOFF_FACTOR
}

impl RetryPolicy {
    /// Exponential backoff after `attempt` failed attempts
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(u64::from(self.backoff_factor).saturating_pow(attempt))
    }
}

/// Bookkeeping of one logical call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far
    pub attempt_count: u32,
    /// Status of the most recent response which had one
    pub last_status: Option<StatusCode>,
}

/// Wraps a [`Fetch`] implementation with a bounded retry loop
#[derive(Debug, Clone)]
pub struct RetryingClient<F> {
    fetcher: F,
    policy: RetryPolicy,
}

impl<F: Fetch> RetryingClient<F> {
    /// Create a client retrying according to `policy`
    pub const fn new(fetcher: F, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// The policy in use
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// The wrapped fetcher, for callers which do their own retrying
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch `target`, returning `None` if no payload could be obtained.
    ///
    /// The reason is logged. Use [`RetryingClient::try_call`] to act on it.
    pub async fn call(&self, target: &FetchTarget) -> Option<Value> {
        match self.try_call(target).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                log::error!("{e}");
                None
            }
        }
    }

    /// Fetch `target` and return its payload.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::Rejected`] if the server answered with a status which
    ///   is not worth retrying, or the request could not be made at all
    /// - [`ErrorKind::GaveUp`] if every permitted attempt failed
    pub async fn try_call(&self, target: &FetchTarget) -> Result<Value> {
        let max_retries = self.policy.max_retries;
        let mut state = RetryState::default();

        while state.attempt_count < max_retries {
            let outcome = self.fetcher.fetch(target).await;
            let delay = match outcome {
                FetchOutcome::Success(payload) => return Ok(payload),
                FetchOutcome::SoftFailure {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    retry_after,
                } => {
                    state.last_status = Some(StatusCode::TOO_MANY_REQUESTS);
                    retry_after.unwrap_or(DEFAULT_RETRY_AFTER)
                }
                FetchOutcome::SoftFailure { status, .. } => {
                    state.last_status = Some(status);
                    self.policy.backoff(state.attempt_count)
                }
                FetchOutcome::TransportError(kind) if kind.is_transient() => {
                    self.policy.backoff(state.attempt_count)
                }
                FetchOutcome::HardFailure(status) => {
                    log::warn!("{target} answered with {status}, not retrying");
                    return Err(ErrorKind::Rejected {
                        target: target.clone(),
                        status: Some(status),
                    });
                }
                FetchOutcome::TransportError(kind) => {
                    log::warn!("{kind} for {target}, not retrying");
                    return Err(ErrorKind::Rejected {
                        target: target.clone(),
                        status: None,
                    });
                }
            };

            log::warn!(
                "Attempt {}/{max_retries} for {target} failed{}, waiting {}s",
                state.attempt_count + 1,
                state
                    .last_status
                    .map(|s| format!(" ({s})"))
                    .unwrap_or_default(),
                delay.as_secs_f64(),
            );
            // Every retryable failure waits, the last one included
            tokio::time::sleep(delay).await;
            state.attempt_count += 1;
        }

        Err(ErrorKind::GaveUp {
            target: target.clone(),
            attempts: state.attempt_count,
            last_status: state.last_status,
        })
    }
}
