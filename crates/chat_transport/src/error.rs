use std::fmt;

use thiserror::Error;

/// Stable failure classification shared by both transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Session credential rejected; cookies must be re-derived externally.
    AuthExpired,
    /// Conversation endpoint refused the sentinel/proof tokens (HTTP 403).
    ChallengeRejected,
    /// Proof-of-work search exhausted its ceiling. Never fatal by itself;
    /// recorded so diagnostics can name it.
    ChallengeUnsolved,
    RateLimited,
    ServerError(u16),
    UpstreamError,
    Timeout,
    EmptyResponse,
    ConnectionFailure,
    /// Caller asked for an impossible combination (e.g. forced API mode
    /// with an automation-only request). Surfaced before any network
    /// activity.
    Config,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthExpired => "auth_expired",
            Self::ChallengeRejected => "challenge_rejected",
            Self::ChallengeUnsolved => "challenge_unsolved",
            Self::RateLimited => "rate_limited",
            Self::ServerError(_) => "server_error",
            Self::UpstreamError => "upstream_error",
            Self::Timeout => "timeout",
            Self::EmptyResponse => "empty_response",
            Self::ConnectionFailure => "connection_failure",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerError(code) => write!(f, "server_error({code})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Normalized failure record emitted to callers: a stable kind plus a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RelayError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RelayError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// True when backing off before another attempt is the only remedy.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.kind == ErrorKind::RateLimited
    }
}
