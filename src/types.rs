use std::fmt;
use std::time::Duration;

use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::{classify, Classification, RequestOptions, TransportError, TransportResult};

/// Closed classification of an attempt's outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response within the deadline.
    Timeout,
    /// Response received with a 4xx or 5xx status.
    HttpError,
    /// DNS failure, refused or reset connection.
    ConnectionError,
    /// Any other failure raised while sending.
    RequestException,
    /// Success.
    None,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::HttpError => "http_error",
            Self::ConnectionError => "connection_error",
            Self::RequestException => "request_exception",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully read HTTP response returned by a [`Transport`](crate::Transport).
#[derive(Clone, Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
    /// Final URL of the request, after redirects.
    pub url: String,
}

impl Response {
    /// `true` for any status below 400.
    pub fn is_success(&self) -> bool {
        self.status.as_u16() < 400
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.text)
    }

    /// Describes an error status the way the server reported it.
    ///
    /// Example: `"500 Server Error: Internal Server Error for url: http://host/path"`
    pub fn error_description(&self) -> String {
        let side = if self.status.is_client_error() {
            "Client Error"
        } else {
            "Server Error"
        };
        format!(
            "{} {side}: {} for url: {}",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or("Unknown"),
            self.url
        )
    }
}

/// One logical HTTP operation as issued by the caller.
#[derive(Clone, Debug)]
pub struct RequestCall {
    pub method: Method,
    pub path: String,
    pub options: RequestOptions,
}

impl RequestCall {
    pub fn new(method: Method, path: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method,
            path: path.into(),
            options,
        }
    }
}

/// One send-and-classify cycle within a call.
#[derive(Debug)]
pub struct Attempt {
    /// 1-based ordinal within the call.
    pub number: u32,
    pub classification: Classification,
    pub elapsed: Duration,
    result: TransportResult,
}

impl Attempt {
    pub fn new(number: u32, result: TransportResult, elapsed: Duration) -> Self {
        Self {
            number,
            classification: classify(&result),
            elapsed,
            result,
        }
    }

    pub fn is_success(&self) -> bool {
        self.classification.is_success()
    }

    pub fn response(&self) -> Option<&Response> {
        self.result.as_ref().ok()
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        self.result.as_ref().err()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.response().map(Response::status_code)
    }

    pub fn response_text(&self) -> Option<&str> {
        self.response().map(|response| response.text.as_str())
    }

    /// String form of the failure, `None` for a successful attempt.
    pub fn description(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        Some(match &self.result {
            Ok(response) => response.error_description(),
            Err(err) => err.to_string(),
        })
    }

    pub fn into_response(self) -> Option<Response> {
        self.result.ok()
    }
}
