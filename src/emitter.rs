use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use crate::observe::split_tags;
use crate::{Attempt, LogFields, LogLevel, Logger, Metrics, SinkResult};

/// Maximum number of characters of a response body attached to a log event.
///
/// Longer bodies are cut to their first `RESPONSE_TEXT_LOG_LIMIT` characters
/// rather than dropped, so the start of an error page is still visible.
pub const RESPONSE_TEXT_LOG_LIMIT: usize = 1000;

/// Per-call values the emitter needs to name and tag events.
#[derive(Clone, Copy, Debug)]
pub struct CallContext<'a> {
    pub request_category: &'a str,
    pub tags: &'a [String],
    /// Log and count intermediate failures. The last attempt is always recorded.
    pub report: bool,
    /// Serialized request parameters, present only with verbose logging.
    pub request_params: Option<&'a JsonValue>,
}

/// Turns attempts into log events and metrics.
///
/// Naming:
/// - `{namespace}.{request_category}.response_time`: timing, every attempt
/// - `{namespace}.{request_category}.request`: counter tagged with status,
///   attempt and error kind
/// - `{log_prefix}.{request_category}`: log event, with `.failed` appended
///   for a failure that will be retried
#[derive(Clone)]
pub struct Emitter {
    logger: Arc<dyn Logger>,
    metrics: Arc<dyn Metrics>,
    log_prefix: String,
    namespace: String,
}

impl Emitter {
    pub fn new(
        logger: Arc<dyn Logger>,
        metrics: Arc<dyn Metrics>,
        log_prefix: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            logger,
            metrics,
            log_prefix: log_prefix.into(),
            namespace: namespace.into(),
        }
    }

    /// Records one attempt. `terminal` marks the attempt that ends the call.
    ///
    /// Never fails: backend errors are logged locally and dropped.
    pub fn emit_attempt(&self, call: &CallContext<'_>, attempt: &Attempt, terminal: bool) {
        let timing = self.metric_name(call.request_category, "response_time");
        let millis = attempt.elapsed.as_secs_f64() * 1000.0;
        self.swallow("timing", self.metrics.timing(&timing, millis, call.tags));

        let will_retry = !attempt.is_success() && !terminal;
        if will_retry && !call.report {
            return;
        }

        let counter = self.metric_name(call.request_category, "request");
        let tags = counter_tags(call.tags, attempt);
        self.swallow("increment", self.metrics.increment(&counter, &tags));

        let level = if attempt.is_success() {
            LogLevel::Info
        } else if will_retry {
            LogLevel::Warning
        } else {
            LogLevel::Error
        };
        let event = self.event_name(call.request_category, will_retry);
        let fields = log_fields(call, attempt);
        self.swallow("log", self.logger.log(level, &event, &fields));
    }

    pub fn metric_name(&self, request_category: &str, metric: &str) -> String {
        if self.namespace.is_empty() {
            format!("{request_category}.{metric}")
        } else {
            format!("{}.{request_category}.{metric}", self.namespace)
        }
    }

    pub fn event_name(&self, request_category: &str, will_retry: bool) -> String {
        if will_retry {
            format!("{}.{request_category}.failed", self.log_prefix)
        } else {
            format!("{}.{request_category}", self.log_prefix)
        }
    }

    fn swallow(&self, operation: &str, result: SinkResult) {
        if let Err(err) = result {
            tracing::warn!(operation, error = %err, "observability backend failed");
        }
    }
}

fn counter_tags(caller_tags: &[String], attempt: &Attempt) -> Vec<String> {
    let mut tags = caller_tags.to_vec();
    if attempt.is_success() {
        tags.push("status:success".to_owned());
    } else {
        tags.push("status:error".to_owned());
    }
    tags.push(format!("attempt:{}", attempt.number));
    if !attempt.is_success() {
        tags.push(format!("error:{}", attempt.classification.kind));
    }
    tags
}

fn log_fields(call: &CallContext<'_>, attempt: &Attempt) -> LogFields {
    let mut fields: LogFields = split_tags(call.tags)
        .into_iter()
        .map(|(key, value)| (key, JsonValue::String(value)))
        .collect();

    fields.insert("attempt".to_owned(), json!(attempt.number));
    let status = if attempt.is_success() { "success" } else { "error" };
    fields.insert("status".to_owned(), json!(status));

    if let Some(status_code) = attempt.status_code() {
        fields.insert("status_code".to_owned(), json!(status_code));
    }
    if !attempt.is_success() {
        fields.insert(
            "error_type".to_owned(),
            json!(attempt.classification.kind.as_str()),
        );
        if let Some(description) = attempt.description() {
            fields.insert("description".to_owned(), json!(description));
        }
    }
    if let Some(text) = attempt.response_text().filter(|text| !text.is_empty()) {
        fields.insert("response_text".to_owned(), json!(truncate(text)));
    }
    if let Some(params) = call.request_params {
        fields.insert("request_params".to_owned(), json!(params.to_string()));
    }
    fields
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(RESPONSE_TEXT_LOG_LIMIT) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
