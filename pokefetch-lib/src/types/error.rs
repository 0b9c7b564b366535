use std::path::PathBuf;

use http::StatusCode;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::FetchTarget;

/// Possible errors when interacting with `pokefetch_lib`
///
/// Note that failed fetches are *not* errors. They are reported as
/// [`crate::FetchOutcome`] values. This type covers misconfiguration, the
/// terminal states of the [`crate::RetryingClient`], payloads which lack the
/// expected fields, and the owned-pokemon store.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A concurrency ceiling of zero would never admit any request
    #[error("Maximum concurrency must be at least 1")]
    InvalidConcurrency,

    /// A cache without any slots cannot memoize anything
    #[error("Cache size must be at least 1")]
    InvalidCacheSize,

    /// Caching was requested for a batch, but no cache was configured
    #[error("Caching was requested, but the batch fetcher has no cache configured")]
    CacheNotConfigured,

    /// The retrying client ran out of attempts
    #[error("Giving up on {target} after {attempts} attempt(s){}", match .last_status {
        Some(code) => format!(" (last status: {code})"),
        None => String::new(),
    })]
    GaveUp {
        /// The target which could not be fetched
        target: FetchTarget,
        /// Number of attempts made
        attempts: u32,
        /// The last HTTP status seen, if any
        last_status: Option<StatusCode>,
    },

    /// The server answered with a status which is not worth retrying
    #[error("Request to {target} was rejected{}", match .status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    })]
    Rejected {
        /// The target which could not be fetched
        target: FetchTarget,
        /// The status code of the response, `None` for non-transient transport errors
        status: Option<StatusCode>,
    },

    /// A species payload is missing one of the stats we need
    #[error("Payload for `{name}` has no `{stat}` stat")]
    MissingStat {
        /// Name of the species
        name: String,
        /// Name of the missing stat
        stat: &'static str,
    },

    /// The payload does not have the expected shape
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// A pokemon with this name already exists in the store
    #[error("Pokemon `{0}` already exists")]
    Duplicate(String),

    /// No pokemon with this name exists in the store
    #[error("Pokemon `{0}` not found")]
    NotFound(String),

    /// A record is missing a required field
    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    /// Any form of I/O error occurred while reading from or writing to a path
    #[error("Failed to access `{}`: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    /// (De)serialization of a JSON document failed
    #[error("Cannot (de)serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The underlying HTTP client could not be built
    #[error("Error creating request client: {0}")]
    BuildClient(#[source] reqwest::Error),

    /// A custom header could not be used
    #[error("Header could not be parsed")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// A URL could not be parsed or joined
    #[error("Cannot parse URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ErrorKind {
    /// Returns `true` if the error means the remote side could not deliver
    /// a payload, as opposed to a local problem
    #[must_use]
    pub const fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::GaveUp { .. } | Self::Rejected { .. })
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl From<(PathBuf, std::io::Error)> for ErrorKind {
    fn from(value: (PathBuf, std::io::Error)) -> Self {
        Self::Io(value.0, value.1)
    }
}
