//! Capability traits for the logging, metrics, tracing and error-reporting
//! backends a [`RequestSession`](crate::RequestSession) reports to.
//!
//! Every trait has a no-op implementation used when the collaborator is not
//! configured. Backend failures are returned as [`SinkError`] and dropped by
//! the session after a local `tracing` warning.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;

/// Structured fields attached to a log event or a captured failure.
pub type LogFields = BTreeMap<String, JsonValue>;

/// Result of a call into an observability backend.
pub type SinkResult = std::result::Result<(), SinkError>;

/// Failure reported by an observability backend.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SinkError(String);

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Log severities understood by a [`Logger`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    Exception,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
        LogLevel::Exception,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Exception => "exception",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leveled structured logger.
///
/// Only [`Logger::log`] is required; the per-level methods forward to it.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, event: &str, fields: &LogFields) -> SinkResult;

    fn debug(&self, event: &str, fields: &LogFields) -> SinkResult {
        self.log(LogLevel::Debug, event, fields)
    }

    fn info(&self, event: &str, fields: &LogFields) -> SinkResult {
        self.log(LogLevel::Info, event, fields)
    }

    fn warning(&self, event: &str, fields: &LogFields) -> SinkResult {
        self.log(LogLevel::Warning, event, fields)
    }

    fn error(&self, event: &str, fields: &LogFields) -> SinkResult {
        self.log(LogLevel::Error, event, fields)
    }

    fn critical(&self, event: &str, fields: &LogFields) -> SinkResult {
        self.log(LogLevel::Critical, event, fields)
    }

    fn exception(&self, event: &str, fields: &LogFields) -> SinkResult {
        self.log(LogLevel::Exception, event, fields)
    }
}

/// Statsd-style metrics client.
pub trait Metrics: Send + Sync {
    fn increment(&self, metric: &str, tags: &[String]) -> SinkResult;

    /// Records a duration in milliseconds.
    fn timing(&self, metric: &str, millis: f64, tags: &[String]) -> SinkResult;
}

/// Span handle returned by a [`Tracer`]. The span finishes when dropped.
pub trait TraceSpan: Send {
    fn set_meta(&mut self, key: &str, value: &str);
}

/// Distributed tracing backend.
pub trait Tracer: Send + Sync {
    fn start_span(
        &self,
        name: &str,
        service: Option<&str>,
        meta: &BTreeMap<String, String>,
    ) -> Box<dyn TraceSpan>;
}

/// Error tracker notified about requests the server rejected as invalid.
pub trait Reporter: Send + Sync {
    fn capture_failure(&self, description: &str, extra: Option<&LogFields>) -> SinkResult;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _event: &str, _fields: &LogFields) -> SinkResult {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn increment(&self, _metric: &str, _tags: &[String]) -> SinkResult {
        Ok(())
    }

    fn timing(&self, _metric: &str, _millis: f64, _tags: &[String]) -> SinkResult {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTracer;

struct NoopSpan;

impl TraceSpan for NoopSpan {
    fn set_meta(&mut self, _key: &str, _value: &str) {}
}

impl Tracer for NoopTracer {
    fn start_span(
        &self,
        _name: &str,
        _service: Option<&str>,
        _meta: &BTreeMap<String, String>,
    ) -> Box<dyn TraceSpan> {
        Box::new(NoopSpan)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn capture_failure(&self, _description: &str, _extra: Option<&LogFields>) -> SinkResult {
        Ok(())
    }
}

/// Default [`Logger`]: forwards events to the `tracing` crate.
///
/// `critical` and `exception` are emitted at ERROR. Fields are rendered as
/// `key=value` pairs in key order.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, event: &str, fields: &LogFields) -> SinkResult {
        let fields = render_fields(fields);
        match level {
            LogLevel::Debug => tracing::debug!(target: "request_session", %fields, "{event}"),
            LogLevel::Info => tracing::info!(target: "request_session", %fields, "{event}"),
            LogLevel::Warning => tracing::warn!(target: "request_session", %fields, "{event}"),
            LogLevel::Error | LogLevel::Critical | LogLevel::Exception => {
                tracing::error!(target: "request_session", %fields, "{event}")
            }
        }
        Ok(())
    }
}

fn render_fields(fields: &LogFields) -> String {
    fields
        .iter()
        .map(|(key, value)| match value {
            JsonValue::String(text) => format!("{key}={text}"),
            other => format!("{key}={other}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits `key:value` tags on the first colon. Tags without a colon are skipped.
pub(crate) fn split_tags(tags: &[String]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|tag| tag.split_once(':'))
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}
