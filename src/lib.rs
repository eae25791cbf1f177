//! `request-session` is an async HTTP client wrapper for service-to-service
//! calls against a single host.
//!
//! Every call goes through one retry loop that:
//! - classifies each attempt ([`classify`]) into an [`ErrorKind`],
//! - retries timeouts, connection failures, 5xx and 408 up to a fixed
//!   budget ([`RetryPolicy`]), with an optional fixed delay,
//! - emits a structured log event and a timing + counter metric per attempt
//!   to the injected [`Logger`] and [`Metrics`] backends.
//!
//! ```no_run
//! use std::time::Duration;
//! use request_session::{RequestOptions, RequestSession};
//!
//! # async fn run() -> request_session::Result<()> {
//! let session = RequestSession::new("https://api.example.com")?;
//! let response = session
//!     .get(
//!         "/v1/search",
//!         RequestOptions::new()
//!             .request_category("search")
//!             .max_retries(2)
//!             .sleep_before_repeat(Duration::from_millis(200)),
//!     )
//!     .await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

mod classify;
mod client;
mod emitter;
mod error;
mod observe;
mod options;
mod retry;
mod transport;
mod types;
mod user_agent;

pub use classify::{classify, classify_status, Classification};
pub use client::{RequestSession, RequestSessionBuilder};
pub use emitter::{CallContext, Emitter, RESPONSE_TEXT_LOG_LIMIT};
pub use error::{RequestFailure, RequestSessionError};
pub use observe::{
    LogFields, LogLevel, Logger, Metrics, NoopLogger, NoopMetrics, NoopReporter, NoopTracer,
    Reporter, SinkError, SinkResult, TraceSpan, Tracer, TracingLogger,
};
pub use options::{parse_max_retries, ClientOptions, RequestBody, RequestOptions};
pub use retry::{RetryDecision, RetryPolicy};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportRequest, TransportResult};
pub use types::{Attempt, ErrorKind, RequestCall, Response};
pub use user_agent::UserAgentComponents;

pub type Result<T> = std::result::Result<T, RequestSessionError>;
