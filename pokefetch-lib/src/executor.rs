//! Execution of single fetch attempts.
//!
//! This module defines the [`Fetch`] trait, the seam every other component
//! is built on, and [`Executor`], its HTTP implementation. An `Executor` is
//! configured through [`ExecutorBuilder`].
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use http::header::{self, HeaderMap, HeaderValue};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::{ErrorKind, FetchOutcome, FetchTarget, Result, TransportErrorKind, headers};

/// Default maximum number of concurrent requests, 100.
pub const DEFAULT_MAX_CONCURRENCY: usize = 100;
/// Default timeout in seconds before a request is deemed as failed, 20.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
/// Default user agent, `pokefetch/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("pokefetch/", env!("CARGO_PKG_VERSION"));

// Constants currently not configurable by the user.
/// A timeout for only the connect phase of a request.
const CONNECT_TIMEOUT: u64 = 10;
/// TCP keepalive
/// See <https://tldp.org/HOWTO/TCP-Keepalive-HOWTO/overview.html> for more info
const TCP_KEEPALIVE: u64 = 60;

/// Something that turns a [`FetchTarget`] into a [`FetchOutcome`].
///
/// Implementations must never panic on bad input and must report every
/// failure as an outcome value.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Perform one attempt for `target`
    async fn fetch(&self, target: &FetchTarget) -> FetchOutcome;
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    async fn fetch(&self, target: &FetchTarget) -> FetchOutcome {
        (**self).fetch(target).await
    }
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for &F {
    async fn fetch(&self, target: &FetchTarget) -> FetchOutcome {
        (**self).fetch(target).await
    }
}

/// Builder for [`Executor`].
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
pub struct ExecutorBuilder {
    /// Total time budget per request, including reading the body.
    #[builder(default = Duration::from_secs(DEFAULT_TIMEOUT_SECS))]
    timeout: Duration,

    /// Time budget for establishing a connection.
    #[builder(default = Duration::from_secs(CONNECT_TIMEOUT))]
    connect_timeout: Duration,

    /// User-agent sent with every request.
    #[builder(default = String::from(DEFAULT_USER_AGENT))]
    user_agent: String,

    /// Number of idle connections kept per host.
    ///
    /// This should match the ceiling of the [`crate::ConcurrencyLimiter`]
    /// driving this executor, otherwise connections get torn down and
    /// re-established under load.
    #[builder(default = DEFAULT_MAX_CONCURRENCY)]
    max_idle_per_host: usize,

    /// Headers added to every request.
    custom_headers: HeaderMap,
}

impl Default for ExecutorBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExecutorBuilder {
    /// Instantiates an [`Executor`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user-agent is invalid.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn executor(self) -> Result<Executor> {
        let Self {
            timeout,
            connect_timeout,
            user_agent,
            max_idle_per_host,
            custom_headers: mut headers,
        } = self;

        headers.insert(header::USER_AGENT, HeaderValue::from_str(&user_agent)?);
        headers
            .entry(header::ACCEPT)
            .or_insert(HeaderValue::from_static("application/json"));

        let reqwest_client = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE))
            .pool_max_idle_per_host(max_idle_per_host)
            .build()
            .map_err(ErrorKind::BuildClient)?;

        Ok(Executor { reqwest_client })
    }
}

/// Issues single GET requests and classifies their outcome.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Executor {
    reqwest_client: reqwest::Client,
}

impl Executor {
    /// Create an executor from an existing `reqwest` client
    #[must_use]
    pub const fn from_client(reqwest_client: reqwest::Client) -> Self {
        Self { reqwest_client }
    }

    async fn execute(&self, target: &FetchTarget) -> FetchOutcome {
        let response = match self.reqwest_client.get(target.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Request to {target} failed: {e}");
                return FetchOutcome::TransportError(TransportErrorKind::from(&e));
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            return FetchOutcome::from_status(status, headers::retry_after(response.headers()));
        }

        match response.json::<Value>().await {
            Ok(payload) => FetchOutcome::Success(payload),
            Err(e) => {
                log::debug!("Cannot read body of {target}: {e}");
                FetchOutcome::TransportError(TransportErrorKind::from(&e))
            }
        }
    }
}

#[async_trait]
impl Fetch for Executor {
    async fn fetch(&self, target: &FetchTarget) -> FetchOutcome {
        let outcome = self.execute(target).await;
        match &outcome {
            FetchOutcome::Success(_) => log::debug!("[{}] {target}", outcome),
            _ => log::warn!("[{}] {target}", outcome),
        }
        outcome
    }
}
