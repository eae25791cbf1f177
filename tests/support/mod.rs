#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use request_session::{
    LogFields, LogLevel, Logger, Metrics, Reporter, SinkError, SinkResult, TraceSpan, Tracer,
};

#[derive(Clone, Debug)]
pub struct LogRecord {
    pub level: LogLevel,
    pub event: String,
    pub fields: LogFields,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MetricRecord {
    Increment { metric: String, tags: Vec<String> },
    Timing { metric: String, tags: Vec<String> },
}

/// Records every event and metric it receives.
#[derive(Default)]
pub struct Recorder {
    logs: Mutex<Vec<LogRecord>>,
    metrics: Mutex<Vec<MetricRecord>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.logs.lock().expect("log mutex").clone()
    }

    pub fn logs_at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.logs()
            .into_iter()
            .filter(|record| record.level == level)
            .collect()
    }

    pub fn metrics(&self) -> Vec<MetricRecord> {
        self.metrics.lock().expect("metric mutex").clone()
    }

    pub fn increments(&self) -> Vec<(String, Vec<String>)> {
        self.metrics()
            .into_iter()
            .filter_map(|record| match record {
                MetricRecord::Increment { metric, tags } => Some((metric, tags)),
                MetricRecord::Timing { .. } => None,
            })
            .collect()
    }

    pub fn timings(&self) -> Vec<String> {
        self.metrics()
            .into_iter()
            .filter_map(|record| match record {
                MetricRecord::Timing { metric, .. } => Some(metric),
                MetricRecord::Increment { .. } => None,
            })
            .collect()
    }
}

impl Logger for Recorder {
    fn log(&self, level: LogLevel, event: &str, fields: &LogFields) -> SinkResult {
        self.logs.lock().expect("log mutex").push(LogRecord {
            level,
            event: event.to_owned(),
            fields: fields.clone(),
        });
        Ok(())
    }
}

impl Metrics for Recorder {
    fn increment(&self, metric: &str, tags: &[String]) -> SinkResult {
        self.metrics
            .lock()
            .expect("metric mutex")
            .push(MetricRecord::Increment {
                metric: metric.to_owned(),
                tags: tags.to_vec(),
            });
        Ok(())
    }

    fn timing(&self, metric: &str, _millis: f64, tags: &[String]) -> SinkResult {
        self.metrics
            .lock()
            .expect("metric mutex")
            .push(MetricRecord::Timing {
                metric: metric.to_owned(),
                tags: tags.to_vec(),
            });
        Ok(())
    }
}

/// Backend that fails every call.
pub struct FailingBackend;

impl Logger for FailingBackend {
    fn log(&self, _level: LogLevel, _event: &str, _fields: &LogFields) -> SinkResult {
        Err(SinkError::new("log backend unavailable"))
    }
}

impl Metrics for FailingBackend {
    fn increment(&self, _metric: &str, _tags: &[String]) -> SinkResult {
        Err(SinkError::new("statsd unavailable"))
    }

    fn timing(&self, _metric: &str, _millis: f64, _tags: &[String]) -> SinkResult {
        Err(SinkError::new("statsd unavailable"))
    }
}

#[derive(Clone, Debug)]
pub struct SpanRecord {
    pub name: String,
    pub service: Option<String>,
    pub meta: BTreeMap<String, String>,
    pub late_meta: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl RecordingTracer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().expect("span mutex").clone()
    }
}

/// Writes meta set after start back into its record.
struct RecordedSpan {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
    index: usize,
}

impl TraceSpan for RecordedSpan {
    fn set_meta(&mut self, key: &str, value: &str) {
        let mut spans = self.spans.lock().expect("span mutex");
        spans[self.index]
            .late_meta
            .insert(key.to_owned(), value.to_owned());
    }
}

impl Tracer for RecordingTracer {
    fn start_span(
        &self,
        name: &str,
        service: Option<&str>,
        meta: &BTreeMap<String, String>,
    ) -> Box<dyn TraceSpan> {
        let mut spans = self.spans.lock().expect("span mutex");
        spans.push(SpanRecord {
            name: name.to_owned(),
            service: service.map(str::to_owned),
            meta: meta.clone(),
            late_meta: BTreeMap::new(),
        });
        Box::new(RecordedSpan {
            spans: self.spans.clone(),
            index: spans.len() - 1,
        })
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    captured: Mutex<Vec<(String, Option<LogFields>)>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn captured(&self) -> Vec<(String, Option<LogFields>)> {
        self.captured.lock().expect("reporter mutex").clone()
    }
}

impl Reporter for RecordingReporter {
    fn capture_failure(&self, description: &str, extra: Option<&LogFields>) -> SinkResult {
        self.captured
            .lock()
            .expect("reporter mutex")
            .push((description.to_owned(), extra.cloned()));
        Ok(())
    }
}
