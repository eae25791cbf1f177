use reqwest::StatusCode;

use crate::{ErrorKind, TransportError, TransportResult};

/// Error kind of an attempt together with whether it may be retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub retriable: bool,
}

impl Classification {
    pub const SUCCESS: Self = Self {
        kind: ErrorKind::None,
        retriable: false,
    };

    pub fn is_success(&self) -> bool {
        self.kind == ErrorKind::None
    }

    fn transient(kind: ErrorKind) -> Self {
        Self {
            kind,
            retriable: true,
        }
    }
}

/// Labels the result of one send.
pub fn classify(result: &TransportResult) -> Classification {
    match result {
        Ok(response) => classify_status(response.status),
        Err(TransportError::Timeout(_)) => Classification::transient(ErrorKind::Timeout),
        Err(TransportError::Connection(_)) => {
            Classification::transient(ErrorKind::ConnectionError)
        }
        Err(TransportError::Other(_)) => Classification::transient(ErrorKind::RequestException),
    }
}

/// Labels a received status code.
///
/// Client errors are final, except 408 Request Timeout which is retried
/// like a server error.
pub fn classify_status(status: StatusCode) -> Classification {
    if status.as_u16() < 400 {
        return Classification::SUCCESS;
    }
    Classification {
        kind: ErrorKind::HttpError,
        retriable: !status.is_client_error() || status == StatusCode::REQUEST_TIMEOUT,
    }
}
