use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT},
    Method, Url,
};
use serde_json::{json, Value as JsonValue};
use tokio::time::sleep;

use crate::{
    emitter::{CallContext, Emitter},
    observe::split_tags,
    Attempt, ClientOptions, LogLevel, Logger, Metrics, NoopMetrics, NoopReporter, NoopTracer,
    Reporter, RequestBody, RequestCall, RequestFailure, RequestOptions, RequestSessionError,
    Response, Result, RetryDecision, RetryPolicy, Tracer, TracingLogger, Transport,
    TransportRequest, ReqwestTransport, UserAgentComponents,
};

/// Levels the session itself logs at; a logger must support all of them.
const REQUIRED_LOG_LEVELS: [LogLevel; 3] = [LogLevel::Info, LogLevel::Warning, LogLevel::Error];

/// HTTP client for one host with retries, structured logs and metrics.
///
/// Cloning is cheap: clones share the transport and the collaborators.
pub struct RequestSession<T: Transport = ReqwestTransport> {
    transport: Arc<T>,
    host: Url,
    options: ClientOptions,
    headers: HeaderMap,
    auth: Option<(String, Option<String>)>,
    emitter: Emitter,
    tracer: Arc<dyn Tracer>,
    reporter: Arc<dyn Reporter>,
}

impl<T: Transport> Clone for RequestSession<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            host: self.host.clone(),
            options: self.options.clone(),
            headers: self.headers.clone(),
            auth: self.auth.clone(),
            emitter: self.emitter.clone(),
            tracer: self.tracer.clone(),
            reporter: self.reporter.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for RequestSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSession")
            .field("host", &self.host.as_str())
            .field("options", &self.options)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RequestSession<ReqwestTransport> {
    /// Creates a session for `host` with default options.
    pub fn new(host: impl Into<String>) -> Result<Self> {
        Self::builder(host).build()
    }

    /// Starts configuring a session for `host`.
    pub fn builder(host: impl Into<String>) -> RequestSessionBuilder<ReqwestTransport> {
        RequestSessionBuilder::new(host)
    }

    /// Creates a session from environment variables.
    ///
    /// Reads `REQUEST_SESSION_HOST` plus everything
    /// [`ClientOptions::from_env`] reads.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("REQUEST_SESSION_HOST").map_err(|_| {
            RequestSessionError::InvalidConfig(
                "missing REQUEST_SESSION_HOST environment variable".to_owned(),
            )
        })?;
        Self::builder(host).options(ClientOptions::from_env()?).build()
    }
}

impl<T: Transport> RequestSession<T> {
    pub fn host(&self) -> &Url {
        &self.host
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends a GET request to `path`, joined onto the host.
    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Option<Response>> {
        self.execute(RequestCall::new(Method::GET, path, options)).await
    }

    pub async fn post(&self, path: &str, options: RequestOptions) -> Result<Option<Response>> {
        self.execute(RequestCall::new(Method::POST, path, options)).await
    }

    pub async fn put(&self, path: &str, options: RequestOptions) -> Result<Option<Response>> {
        self.execute(RequestCall::new(Method::PUT, path, options)).await
    }

    pub async fn patch(&self, path: &str, options: RequestOptions) -> Result<Option<Response>> {
        self.execute(RequestCall::new(Method::PATCH, path, options)).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Option<Response>> {
        self.execute(RequestCall::new(Method::DELETE, path, options)).await
    }

    /// Runs a call to completion, retrying transient failures.
    ///
    /// Returns `Ok(Some(response))` on success. When the call fails and
    /// `raise_for_status` is disabled, the last failed response is returned
    /// instead of an error, or `Ok(None)` if the last attempt produced no
    /// response at all. Check [`Response::is_success`] to tell them apart.
    pub async fn execute(&self, call: RequestCall) -> Result<Option<Response>> {
        let options = &call.options;
        let request_category = self.request_category(options.request_category.as_deref())?;
        let request = self.transport_request(&call)?;
        let policy = RetryPolicy::new(
            options.max_retries.unwrap_or(self.options.max_retries),
            options.sleep_before_repeat,
        );
        let raise_for_status = options
            .raise_for_status
            .unwrap_or(self.options.raise_for_status);
        let verbose_logging = options
            .verbose_logging
            .unwrap_or(self.options.verbose_logging);
        let request_params = verbose_logging.then(|| request_params(&request));
        let context = CallContext {
            request_category,
            tags: &options.tags,
            report: options.report,
            request_params: request_params.as_ref(),
        };

        let mut span_meta = split_tags(&options.tags);
        span_meta.insert("request_category".to_owned(), request_category.to_owned());
        let _span = self.tracer.start_span(
            request_category,
            self.options.service_name.as_deref(),
            &span_meta,
        );

        let mut number = 0u32;
        loop {
            number += 1;
            let started = Instant::now();
            let result = self.transport.send(request.clone()).await;
            let attempt = Attempt::new(number, result, started.elapsed());

            let decision = policy.decide(number, attempt.classification);
            self.emitter
                .emit_attempt(&context, &attempt, decision.is_stop());

            match decision {
                RetryDecision::Retry { wait } => {
                    self.wait_before_retry(request_category, &options.tags, wait)
                        .await;
                }
                RetryDecision::Stop => {
                    return self.finish(attempt, raise_for_status, options.report);
                }
            }
        }
    }

    fn finish(
        &self,
        attempt: Attempt,
        raise_for_status: bool,
        report: bool,
    ) -> Result<Option<Response>> {
        if attempt.is_success() {
            return Ok(attempt.into_response());
        }

        let description = attempt.description().unwrap_or_default();
        if !attempt.classification.retriable && report {
            self.report_client_error(&description, attempt.response_text());
        }

        if !raise_for_status {
            return Ok(attempt.into_response());
        }

        let failure = RequestFailure {
            kind: attempt.classification.kind,
            retriable: attempt.classification.retriable,
            status: attempt.status_code(),
            description,
            attempts: attempt.number,
            response: attempt.into_response(),
        };
        Err(RequestSessionError::Request(Box::new(failure)))
    }

    fn report_client_error(&self, description: &str, response_text: Option<&str>) {
        let extra = response_text.filter(|text| !text.is_empty()).map(|text| {
            let mut extra = crate::LogFields::new();
            extra.insert("response_text".to_owned(), json!(text));
            extra
        });
        if let Err(err) = self.reporter.capture_failure(description, extra.as_ref()) {
            tracing::warn!(error = %err, "failure reporter failed");
        }
    }

    /// Waits before the next attempt, inside a `*_retry` span.
    ///
    /// Only the calling task is suspended.
    async fn wait_before_retry(&self, request_category: &str, tags: &[String], wait: Duration) {
        if wait.is_zero() {
            return;
        }

        tracing::debug!(
            request_category,
            delay_ms = wait.as_millis() as u64,
            "retrying request after delay"
        );

        let mut meta = split_tags(tags);
        meta.insert("request_category".to_owned(), request_category.to_owned());
        let trace_name = format!("{}_retry", request_category.replace('.', "_"));
        let mut span = self
            .tracer
            .start_span(&trace_name, Some("sleep"), &BTreeMap::new());
        for (key, value) in &meta {
            span.set_meta(key, value);
        }

        sleep(wait).await;
    }

    fn request_category<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str> {
        requested
            .or(self.options.request_category.as_deref())
            .filter(|category| !category.is_empty())
            .ok_or_else(|| {
                RequestSessionError::InvalidConfig(
                    "'request_category' is required parameter.".to_owned(),
                )
            })
    }

    fn transport_request(&self, call: &RequestCall) -> Result<TransportRequest> {
        let url = self
            .host
            .join(&call.path)
            .map_err(|err| RequestSessionError::InvalidUrl(format!("{}: {err}", call.path)))?;

        let mut headers = self.headers.clone();
        for (name, value) in &call.options.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        Ok(TransportRequest {
            method: call.method.clone(),
            url,
            timeout: call.options.timeout.unwrap_or(self.options.timeout()),
            headers,
            query: call.options.query.clone(),
            body: call.options.body.clone(),
            basic_auth: self.auth.clone(),
        })
    }
}

fn request_params(request: &TransportRequest) -> JsonValue {
    let body = match &request.body {
        Some(RequestBody::Json(value)) => value.clone(),
        Some(RequestBody::Text(text)) => JsonValue::String(text.clone()),
        None => JsonValue::Null,
    };
    let params = if request.query.is_empty() {
        JsonValue::Null
    } else {
        let query: BTreeMap<&str, &str> = request
            .query
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        json!(query)
    };
    json!({
        "method": request.method.as_str(),
        "url": request.url.as_str(),
        "timeout": request.timeout.as_secs_f64(),
        "params": params,
        "body": body,
    })
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|err| RequestSessionError::InvalidConfig(format!("header name {name:?}: {err}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|err| RequestSessionError::InvalidConfig(format!("header {name}: {err}")))?;
    Ok((header_name, header_value))
}

/// Configures and validates a [`RequestSession`].
pub struct RequestSessionBuilder<T: Transport = ReqwestTransport> {
    host: String,
    transport: T,
    options: ClientOptions,
    headers: Vec<(String, String)>,
    auth: Option<(String, Option<String>)>,
    user_agent: Option<String>,
    user_agent_components: Option<UserAgentComponents>,
    logger: Arc<dyn Logger>,
    metrics: Arc<dyn Metrics>,
    tracer: Option<Arc<dyn Tracer>>,
    reporter: Arc<dyn Reporter>,
}

impl RequestSessionBuilder<ReqwestTransport> {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            transport: ReqwestTransport::new(),
            options: ClientOptions::default(),
            headers: Vec::new(),
            auth: None,
            user_agent: None,
            user_agent_components: None,
            logger: Arc::new(TracingLogger),
            metrics: Arc::new(NoopMetrics),
            tracer: None,
            reporter: Arc::new(NoopReporter),
        }
    }
}

impl<T: Transport> RequestSessionBuilder<T> {
    /// Replaces the transport, e.g. to share a preconfigured client.
    pub fn transport<U: Transport>(self, transport: U) -> RequestSessionBuilder<U> {
        RequestSessionBuilder {
            host: self.host,
            transport,
            options: self.options,
            headers: self.headers,
            auth: self.auth,
            user_agent: self.user_agent,
            user_agent_components: self.user_agent_components,
            logger: self.logger,
            metrics: self.metrics,
            tracer: self.tracer,
            reporter: self.reporter,
        }
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Header sent with every request of the session.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.auth = Some((username.into(), password));
        self
    }

    /// Explicit User-Agent. Takes precedence over [`Self::user_agent_components`].
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn user_agent_components(mut self, components: UserAgentComponents) -> Self {
        self.user_agent_components = Some(components);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn build(self) -> Result<RequestSession<T>> {
        let host_text = self.host.trim();
        if host_text.is_empty() {
            return Err(RequestSessionError::InvalidConfig("host is required".to_owned()));
        }
        let host = Url::parse(host_text)
            .map_err(|err| RequestSessionError::InvalidConfig(format!("host {host_text:?}: {err}")))?;

        if let Some(level) = REQUIRED_LOG_LEVELS
            .iter()
            .find(|level| !self.options.allowed_log_levels.contains(*level))
        {
            return Err(RequestSessionError::InvalidConfig(format!(
                "log level '{level}' must be allowed"
            )));
        }

        if self.options.service_name.is_some() && self.tracer.is_none() {
            return Err(RequestSessionError::InvalidConfig(
                "a tracer must be provided in order to report a service name".to_owned(),
            ));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }
        let user_agent = match (self.user_agent, self.user_agent_components) {
            (Some(user_agent), _) => Some(user_agent),
            (None, Some(components)) => Some(components.to_header_value()?),
            (None, None) => None,
        };
        if let Some(user_agent) = user_agent {
            let value = HeaderValue::from_str(&user_agent).map_err(|err| {
                RequestSessionError::InvalidUserAgent(format!("{user_agent:?}: {err}"))
            })?;
            headers.insert(USER_AGENT, value);
        }

        let emitter = Emitter::new(
            self.logger,
            self.metrics,
            self.options.log_prefix.clone(),
            self.options.metric_namespace.clone(),
        );

        Ok(RequestSession {
            transport: Arc::new(self.transport),
            host,
            options: self.options,
            headers,
            auth: self.auth,
            emitter,
            tracer: self.tracer.unwrap_or_else(|| Arc::new(NoopTracer)),
            reporter: self.reporter,
        })
    }
}
