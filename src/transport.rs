use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::time::Duration;

use reqwest::{header::HeaderMap, Method, Url};

use crate::{RequestBody, Response};

/// Result of a single send as seen by the classifier.
pub type TransportResult = std::result::Result<Response, TransportError>;

/// Failure raised by a [`Transport`] before a response was received.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No response within the request deadline.
    #[error("timeout: {0}")]
    Timeout(String),
    /// DNS failure, refused connection, or a connection dropped by the peer.
    #[error("connection error: {0}")]
    Connection(String),
    /// Anything else, including body read failures.
    #[error("request error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            Self::Timeout(message)
        } else if err.is_connect() || is_connection_lost(&err) {
            Self::Connection(message)
        } else {
            Self::Other(message)
        }
    }
}

/// Walks the source chain looking for a connection the peer reset or closed.
fn is_connection_lost(err: &(dyn StdError + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_closed() {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Everything a transport needs to perform one send.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub timeout: Duration,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub basic_auth: Option<(String, Option<String>)>,
}

/// Sends a request and returns either a fully read response or a typed error.
///
/// HTTP error statuses are returned as `Ok` responses; classifying them is
/// the caller's job.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = TransportResult> + Send;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing client, keeping its connection pool and settings.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> TransportResult {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .timeout(request.timeout)
            .headers(request.headers);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some((username, password)) = request.basic_auth {
            builder = builder.basic_auth(username, password);
        }
        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Text(text)) => builder.body(text),
            None => builder,
        };

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let text = response.text().await.map_err(TransportError::from_reqwest)?;

        Ok(Response {
            status,
            headers,
            text,
            url,
        })
    }
}
