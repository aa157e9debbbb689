use std::fmt;

use chat_transport::{ErrorKind, RelayError};
use serde_json::Error as JsonError;

/// Longest error-body excerpt carried in diagnostics.
const BODY_EXCERPT_LEN: usize = 200;

#[derive(Debug)]
pub enum ApiError {
    /// Session endpoint answered 200 without an access token; cookies are
    /// stale and must be re-derived externally.
    MissingAccessToken,
    /// Sentinel endpoint answered 200 without a requirements token.
    MissingSentinelToken,
    /// Credential rejected (HTTP 401).
    AuthExpired,
    /// Sentinel/proof tokens refused (HTTP 403); carries a body excerpt.
    ChallengeRejected(String),
    /// HTTP 429 from any endpoint.
    RateLimited(String),
    /// Any other non-success status.
    Status(u16, String),
    /// Error object delivered inside the event stream.
    Upstream(String),
    /// Stream closed normally but no text ever accumulated.
    EmptyResponse,
    /// No bytes (and no text) arrived within the deadline.
    Timeout(u64),
    Connection(String),
    Request(reqwest::Error),
    Serde(JsonError),
}

impl ApiError {
    /// Truncate an error body for diagnostics without flooding logs.
    #[must_use]
    pub fn excerpt(body: &str) -> String {
        let trimmed = body.trim();
        if trimmed.len() <= BODY_EXCERPT_LEN {
            return trimmed.to_string();
        }
        let mut cut = BODY_EXCERPT_LEN;
        while !trimmed.is_char_boundary(cut) {
            cut -= 1;
        }
        trimmed[..cut].to_string()
    }

    /// Stable classification for the normalized caller-facing record.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingAccessToken | Self::AuthExpired => ErrorKind::AuthExpired,
            Self::ChallengeRejected(_) => ErrorKind::ChallengeRejected,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Status(code, _) => ErrorKind::ServerError(*code),
            Self::MissingSentinelToken | Self::Upstream(_) | Self::Serde(_) => {
                ErrorKind::UpstreamError
            }
            Self::EmptyResponse => ErrorKind::EmptyResponse,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Connection(_) => ErrorKind::ConnectionFailure,
            Self::Request(error) => {
                if error.is_timeout() {
                    ErrorKind::Timeout
                } else if error.is_connect() {
                    ErrorKind::ConnectionFailure
                } else {
                    ErrorKind::UpstreamError
                }
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAccessToken => {
                write!(f, "no access token in session response; cookies may be expired")
            }
            Self::MissingSentinelToken => write!(f, "no token in sentinel response"),
            Self::AuthExpired => write!(f, "authentication expired; re-extract cookies"),
            Self::ChallengeRejected(body) => {
                write!(f, "access denied (403); sentinel/proof token refused: {body}")
            }
            Self::RateLimited(message) => write!(f, "rate limit reached: {message}"),
            Self::Status(code, body) => write!(f, "API error {code}: {body}"),
            Self::Upstream(message) => write!(f, "upstream error: {message}"),
            Self::EmptyResponse => write!(f, "empty response from API"),
            Self::Timeout(secs) => write!(f, "timeout after {secs}s waiting for response"),
            Self::Connection(message) => write!(f, "connection failed: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for ApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

impl From<ApiError> for RelayError {
    fn from(error: ApiError) -> Self {
        RelayError::new(error.kind(), error.to_string())
    }
}
