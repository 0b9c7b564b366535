use std::fmt::Display;
use std::time::Duration;

use http::StatusCode;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

const ICON_OK: &str = "✔";
const ICON_SOFT: &str = "↻";
const ICON_HARD: &str = "✗";
const ICON_TIMEOUT: &str = "⧖";
const ICON_TRANSPORT: &str = "⚡";

/// The reason a request never produced an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The connection could not be established or was dropped
    Connection,
    /// The request did not finish within its time budget
    Timeout,
    /// Anything else, e.g. a malformed URL or an undecodable body.
    /// Unlike the two variants above, this is not worth retrying.
    Other,
}

impl TransportErrorKind {
    /// Returns `true` if a later attempt has a chance to succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }
}

impl From<&reqwest::Error> for TransportErrorKind {
    fn from(e: &reqwest::Error) -> Self {
        // A connect timeout reports both `is_timeout` and `is_connect`
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connection
        } else {
            Self::Other
        }
    }
}

impl Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => f.write_str("Connection error"),
            Self::Timeout => f.write_str("Timeout"),
            Self::Other => f.write_str("Request error"),
        }
    }
}

/// Classified result of a single fetch attempt.
///
/// Exactly one variant is produced per attempt. Failures are values, not
/// errors: nothing in the fetch layer turns an outcome into an `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// HTTP 200 with a JSON body
    Success(Value),
    /// A retryable HTTP status (429, 500, 503).
    /// `retry_after` holds the server's `Retry-After` hint if it sent one.
    SoftFailure {
        /// The status code of the response
        status: StatusCode,
        /// Parsed `Retry-After` header
        retry_after: Option<Duration>,
    },
    /// A status code which won't get better by asking again
    HardFailure(StatusCode),
    /// No HTTP status was received at all
    TransportError(TransportErrorKind),
}

impl FetchOutcome {
    /// Classify a response status other than `200 OK`.
    ///
    /// 429, 500 and 503 are soft failures; everything else, including other
    /// 2xx codes, is a hard failure.
    #[must_use]
    pub fn from_status(status: StatusCode, retry_after: Option<Duration>) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE => Self::SoftFailure {
                status,
                retry_after,
            },
            _ => Self::HardFailure(status),
        }
    }

    /// Returns `true` if the outcome carries a payload
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns `true` for every variant except [`FetchOutcome::Success`]
    #[inline]
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// The HTTP status code of the attempt, if one was received
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Success(_) => Some(StatusCode::OK),
            Self::SoftFailure { status, .. } | Self::HardFailure(status) => Some(*status),
            Self::TransportError(_) => None,
        }
    }

    /// Borrow the payload of a successful outcome
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success(payload) => Some(payload),
            _ => None,
        }
    }

    /// Consume the outcome and return the payload of a successful outcome
    #[must_use]
    pub fn into_payload(self) -> Option<Value> {
        match self {
            Self::Success(payload) => Some(payload),
            _ => None,
        }
    }

    /// A single character describing the outcome, used in terminal output
    #[must_use]
    pub const fn icon(&self) -> &'static str {
        match self {
            Self::Success(_) => ICON_OK,
            Self::SoftFailure { .. } => ICON_SOFT,
            Self::HardFailure(_) => ICON_HARD,
            Self::TransportError(TransportErrorKind::Timeout) => ICON_TIMEOUT,
            Self::TransportError(_) => ICON_TRANSPORT,
        }
    }
}

impl Display for FetchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success(_) => write!(f, "{}", StatusCode::OK),
            Self::SoftFailure {
                status,
                retry_after: Some(wait),
            } => write!(f, "{status} (retry after {}s)", wait.as_secs()),
            Self::SoftFailure { status, .. } | Self::HardFailure(status) => write!(f, "{status}"),
            Self::TransportError(kind) => write!(f, "{kind}"),
        }
    }
}

impl Serialize for FetchOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let kind = match self {
            Self::Success(_) => "success",
            Self::SoftFailure { .. } => "soft_failure",
            Self::HardFailure(_) => "hard_failure",
            Self::TransportError(_) => "transport_error",
        };

        let mut s;
        if let Some(code) = self.status() {
            s = serializer.serialize_struct("FetchOutcome", 3)?;
            s.serialize_field("kind", kind)?;
            s.serialize_field("text", &self.to_string())?;
            s.serialize_field("code", &code.as_u16())?;
        } else {
            s = serializer.serialize_struct("FetchOutcome", 2)?;
            s.serialize_field("kind", kind)?;
            s.serialize_field("text", &self.to_string())?;
        }
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::StatusCode;
    use rstest::rstest;
    use serde_json::json;

    use super::{FetchOutcome, TransportErrorKind};

    #[rstest]
    #[case(429, true)]
    #[case(500, true)]
    #[case(503, true)]
    #[case(400, false)]
    #[case(401, false)]
    #[case(403, false)]
    #[case(404, false)]
    #[case(418, false)]
    #[case(502, false)]
    #[case(204, false)]
    fn test_from_status(#[case] code: u16, #[case] soft: bool) {
        let status = StatusCode::from_u16(code).unwrap();
        let outcome = FetchOutcome::from_status(status, None);
        assert_eq!(
            matches!(outcome, FetchOutcome::SoftFailure { .. }),
            soft,
            "unexpected classification for {code}"
        );
        assert_eq!(outcome.status(), Some(status));
    }

    #[test]
    fn test_payload_accessors() {
        let outcome = FetchOutcome::Success(json!({"name": "pikachu"}));
        assert!(outcome.is_success());
        assert_eq!(outcome.payload(), Some(&json!({"name": "pikachu"})));

        let outcome = FetchOutcome::TransportError(TransportErrorKind::Timeout);
        assert!(outcome.is_failure());
        assert_eq!(outcome.status(), None);
        assert_eq!(outcome.into_payload(), None);
    }

    #[test]
    fn test_display() {
        let outcome = FetchOutcome::SoftFailure {
            status: StatusCode::TOO_MANY_REQUESTS,
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(outcome.to_string(), "429 Too Many Requests (retry after 3s)");
        assert_eq!(
            FetchOutcome::HardFailure(StatusCode::NOT_FOUND).to_string(),
            "404 Not Found"
        );
    }

    #[test]
    fn test_serialize() {
        let outcome = FetchOutcome::HardFailure(StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"kind": "hard_failure", "text": "404 Not Found", "code": 404})
        );

        let outcome = FetchOutcome::TransportError(TransportErrorKind::Connection);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"kind": "transport_error", "text": "Connection error"})
        );
    }

    #[test]
    fn test_transient_transport_errors() {
        assert!(TransportErrorKind::Connection.is_transient());
        assert!(TransportErrorKind::Timeout.is_transient());
        assert!(!TransportErrorKind::Other.is_transient());
    }
}
