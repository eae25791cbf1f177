use crate::{ErrorKind, Response};

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RequestSessionError {
    /// The call failed and `raise_for_status` was enabled for it.
    #[error("request failed: {0}")]
    Request(Box<RequestFailure>),
    /// Client or call configuration was rejected before any request was sent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// User-Agent assembled from components does not match the expected format.
    #[error("invalid user agent: {0}")]
    InvalidUserAgent(String),
    /// Path could not be joined onto the configured host.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl RequestSessionError {
    /// Classified cause of a failed call, if this error came from one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Request(failure) => Some(failure.kind),
            _ => None,
        }
    }

    /// HTTP status of the last attempt, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(failure) => failure.status,
            _ => None,
        }
    }
}

/// Terminal failure of a call, surfaced when `raise_for_status` is enabled.
#[derive(Debug, thiserror::Error)]
#[error("{kind} after {attempts} attempt(s): {description}")]
pub struct RequestFailure {
    /// Classified cause of the last attempt.
    pub kind: ErrorKind,
    /// Whether the cause was retriable. `false` means the server rejected the
    /// request with a client error and no retry was made.
    pub retriable: bool,
    /// HTTP status of the last attempt, if any.
    pub status: Option<u16>,
    /// Human-readable description of the underlying failure.
    pub description: String,
    /// Number of attempts made for this call.
    pub attempts: u32,
    /// Last response received, if the last attempt produced one.
    pub response: Option<Response>,
}
