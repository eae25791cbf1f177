use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{LogLevel, RequestSessionError, Result};

/// Client-level defaults shared by every call of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Number of retries after the nominal attempt.
    pub max_retries: u32,
    /// Return an error instead of the failed response when a call fails.
    pub raise_for_status: bool,
    /// Attach serialized request parameters to log events.
    pub verbose_logging: bool,
    /// Category used by calls that do not name one.
    pub request_category: Option<String>,
    /// Prefix of every log event name.
    pub log_prefix: String,
    /// Leading segment of metric names. Empty means no namespace.
    pub metric_namespace: String,
    /// Service name attached to request spans. Requires a tracer.
    pub service_name: Option<String>,
    /// Levels the configured logger supports.
    pub allowed_log_levels: Vec<LogLevel>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 0,
            raise_for_status: true,
            verbose_logging: false,
            request_category: None,
            log_prefix: "requestsession".to_owned(),
            metric_namespace: String::new(),
            service_name: None,
            allowed_log_levels: LogLevel::ALL.to_vec(),
        }
    }
}

impl ClientOptions {
    /// Reads options from `REQUEST_SESSION_*` environment variables.
    ///
    /// Reads:
    /// - `REQUEST_SESSION_TIMEOUT_MS`
    /// - `REQUEST_SESSION_MAX_RETRIES` (must not be negative)
    /// - `REQUEST_SESSION_RAISE_FOR_STATUS`
    /// - `REQUEST_SESSION_VERBOSE_LOGGING`
    /// - `REQUEST_SESSION_REQUEST_CATEGORY`
    /// - `REQUEST_SESSION_LOG_PREFIX`
    /// - `REQUEST_SESSION_METRIC_NAMESPACE`
    /// - `REQUEST_SESSION_SERVICE_NAME`
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ClientOptions::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = var("REQUEST_SESSION_TIMEOUT_MS") {
            options.timeout_ms = value.trim().parse().map_err(|_| {
                invalid(format!("REQUEST_SESSION_TIMEOUT_MS is not a number: {value}"))
            })?;
        }
        if let Some(value) = var("REQUEST_SESSION_MAX_RETRIES") {
            options.max_retries = parse_max_retries(&value)?;
        }
        if let Some(value) = var("REQUEST_SESSION_RAISE_FOR_STATUS") {
            options.raise_for_status = parse_flag("REQUEST_SESSION_RAISE_FOR_STATUS", &value)?;
        }
        if let Some(value) = var("REQUEST_SESSION_VERBOSE_LOGGING") {
            options.verbose_logging = parse_flag("REQUEST_SESSION_VERBOSE_LOGGING", &value)?;
        }
        if let Some(value) = var("REQUEST_SESSION_REQUEST_CATEGORY") {
            options.request_category = Some(value.trim().to_owned());
        }
        if let Some(value) = var("REQUEST_SESSION_LOG_PREFIX") {
            options.log_prefix = value.trim().to_owned();
        }
        if let Some(value) = var("REQUEST_SESSION_METRIC_NAMESPACE") {
            options.metric_namespace = value.trim().to_owned();
        }
        if let Some(value) = var("REQUEST_SESSION_SERVICE_NAME") {
            options.service_name = Some(value.trim().to_owned());
        }
        Ok(options)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Parses a retry budget from untyped input, rejecting negative values.
pub fn parse_max_retries(value: &str) -> Result<u32> {
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("max_retries is not an integer: {value}")))?;
    if parsed < 0 {
        return Err(invalid(format!("max_retries must be >= 0, got {parsed}")));
    }
    u32::try_from(parsed).map_err(|_| invalid(format!("max_retries is too large: {parsed}")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(format!("{name} is not a boolean: {value}"))),
    }
}

fn invalid(message: String) -> RequestSessionError {
    RequestSessionError::InvalidConfig(message)
}

/// Body sent with a request.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Json(JsonValue),
    Text(String),
}

/// Per-call overrides. Every unset value falls back to [`ClientOptions`].
#[derive(Clone, Debug, PartialEq)]
pub struct RequestOptions {
    pub request_category: Option<String>,
    pub max_retries: Option<u32>,
    pub timeout: Option<Duration>,
    pub sleep_before_repeat: Option<Duration>,
    /// `key:value` tags added to metrics and split into log fields.
    pub tags: Vec<String>,
    pub raise_for_status: Option<bool>,
    /// Log and count failed attempts that will be retried. Defaults to `true`.
    pub report: bool,
    pub verbose_logging: Option<bool>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            request_category: None,
            max_retries: None,
            timeout: None,
            sleep_before_repeat: None,
            tags: Vec::new(),
            raise_for_status: None,
            report: true,
            verbose_logging: None,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_category(mut self, request_category: impl Into<String>) -> Self {
        self.request_category = Some(request_category.into());
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn sleep_before_repeat(mut self, delay: Duration) -> Self {
        self.sleep_before_repeat = Some(delay);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn raise_for_status(mut self, raise_for_status: bool) -> Self {
        self.raise_for_status = Some(raise_for_status);
        self
    }

    pub fn report(mut self, report: bool) -> Self {
        self.report = report;
        self
    }

    pub fn verbose_logging(mut self, verbose_logging: bool) -> Self {
        self.verbose_logging = Some(verbose_logging);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Serializes `body` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|err| invalid(format!("request body is not serializable: {err}")))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }
}
