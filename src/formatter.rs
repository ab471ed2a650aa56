//! Builds [`LogRecord`]s from the arguments of a log call.

use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::http::{HttpRequest, HttpResponse};
use crate::record::{
    HttpRequestContext, HttpRequestEntry, LogRecord, RecordBody, RecordContext, ServiceContext,
    Severity, SourceLocation, SourceReference, REPORTED_ERROR_EVENT_TYPE,
};
use crate::redact::Redactor;
use crate::report::ErrorReport;

/// Optional arguments shared by every severity call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogArgs<'a> {
    pub request: Option<&'a HttpRequest>,
    pub response: Option<&'a HttpResponse>,
    pub user: Option<&'a str>,
    pub skip_log: bool,
    pub labels: Option<&'a BTreeMap<String, String>>,
}

impl<'a> LogArgs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(mut self, request: &'a HttpRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn response(mut self, response: &'a HttpResponse) -> Self {
        self.response = Some(response);
        self
    }

    /// Shorthand for a request/response pair.
    pub fn http(self, request: &'a HttpRequest, response: &'a HttpResponse) -> Self {
        self.request(request).response(response)
    }

    pub fn user(mut self, user: &'a str) -> Self {
        self.user = Some(user);
        self
    }

    pub fn skip_log(mut self, skip_log: bool) -> Self {
        self.skip_log = skip_log;
        self
    }

    pub fn labels(mut self, labels: &'a BTreeMap<String, String>) -> Self {
        self.labels = Some(labels);
        self
    }
}

/// First argument of a log call.
#[derive(Debug, Clone, PartialEq)]
pub enum LogPayload {
    /// Opaque data, redacted and attached as `logPayload`.
    Data(Value),
    /// Reportable error, attached as `message` + `err`.
    Error(ErrorReport),
}

impl LogPayload {
    /// Whether the value itself asks not to be logged, via a truthy
    /// `skipLog` property or [`ErrorReport::skip_log`].
    pub fn requests_skip(&self) -> bool {
        match self {
            LogPayload::Data(value) => value.get("skipLog").map(is_truthy).unwrap_or(false),
            LogPayload::Error(report) => {
                report.skip_log
                    || report
                        .details
                        .as_ref()
                        .and_then(|d| d.get("skipLog"))
                        .map(is_truthy)
                        .unwrap_or(false)
            }
        }
    }
}

impl From<Value> for LogPayload {
    fn from(value: Value) -> Self {
        LogPayload::Data(value)
    }
}

impl From<ErrorReport> for LogPayload {
    fn from(report: ErrorReport) -> Self {
        LogPayload::Error(report)
    }
}

/// JSON truthiness: `false`, `null`, `0`, `NaN` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A record together with the suppression decision taken while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedRecord {
    pub record: LogRecord,
    pub suppressed: bool,
}

/// Static, per-process part of every record plus the shared redactor.
#[derive(Debug, Clone)]
pub struct Formatter {
    name: String,
    service: ServiceContext,
    source: SourceReference,
    redactor: Arc<Redactor>,
}

impl Formatter {
    pub fn new(service: ServiceContext, source: SourceReference, redactor: Arc<Redactor>) -> Self {
        Formatter {
            name: service.service.clone(),
            service,
            source,
            redactor,
        }
    }

    pub fn redactor(&self) -> &Arc<Redactor> {
        &self.redactor
    }

    /// Build the record for one call and decide whether it is suppressed.
    ///
    /// The record is always fully built; suppression only affects whether
    /// the caller dispatches it.
    pub fn format(
        &self,
        severity: Severity,
        payload: LogPayload,
        args: &LogArgs<'_>,
        src: Option<SourceLocation>,
    ) -> FormattedRecord {
        let suppressed = args.skip_log || payload.requests_skip();

        let body = match payload {
            LogPayload::Data(value) => RecordBody::Data {
                log_payload: self.redactor.redact(value),
            },
            LogPayload::Error(report) => RecordBody::Error {
                event_type: REPORTED_ERROR_EVENT_TYPE,
                message: report.record_message(),
                err: report.serialized(),
            },
        };

        let mut builder = RecordBuilder::new(self.name.clone(), severity, body)
            .service_context(self.service.clone())
            .source_reference(self.source.clone());
        if let Some(src) = src {
            builder = builder.src(src);
        }
        if let (Some(req), Some(res)) = (args.request, args.response) {
            builder = builder.http_exchange(req, res);
        }
        if let Some(req) = args.request {
            builder = builder.req(self.redactor.redact(req.serialized()));
        }
        if let Some(res) = args.response {
            builder = builder.res(self.redactor.redact(res.serialized()));
        }
        if let Some(user) = args.user {
            builder = builder.user(user);
        }
        if let Some(labels) = args.labels {
            builder = builder.labels(labels.clone());
        }

        FormattedRecord {
            record: builder.build(),
            suppressed,
        }
    }
}

/// Assembles a [`LogRecord`], tracking which optional sections were
/// supplied. A section is present exactly when its setter was called.
#[derive(Debug)]
pub struct RecordBuilder {
    name: String,
    severity: Severity,
    body: RecordBody,
    src: Option<SourceLocation>,
    service: ServiceContext,
    source: SourceReference,
    http_context: Option<HttpRequestContext>,
    http_entry: Option<HttpRequestEntry>,
    user: Option<String>,
    req: Option<Value>,
    res: Option<Value>,
    labels: Option<BTreeMap<String, String>>,
}

impl RecordBuilder {
    pub fn new(name: String, severity: Severity, body: RecordBody) -> Self {
        RecordBuilder {
            name,
            severity,
            body,
            src: None,
            service: ServiceContext::default(),
            source: SourceReference::default(),
            http_context: None,
            http_entry: None,
            user: None,
            req: None,
            res: None,
            labels: None,
        }
    }

    pub fn service_context(mut self, service: ServiceContext) -> Self {
        self.service = service;
        self
    }

    pub fn source_reference(mut self, source: SourceReference) -> Self {
        self.source = source;
        self
    }

    pub fn src(mut self, src: SourceLocation) -> Self {
        self.src = Some(src);
        self
    }

    /// Derive both HTTP summaries from a request/response pair.
    pub fn http_exchange(mut self, req: &HttpRequest, res: &HttpResponse) -> Self {
        let method = req.method.clone();
        let url = req.display_url().map(str::to_string);
        let remote_ip = req.remote_ip().map(str::to_string);
        let referrer = req.referrer().map(str::to_string);
        let user_agent = req.user_agent().map(str::to_string);

        self.http_context = Some(HttpRequestContext {
            method: method.clone(),
            referrer: referrer.clone(),
            remote_ip: remote_ip.clone(),
            response_status_code: res.status_code,
            url: url.clone(),
            user_agent: user_agent.clone(),
        });
        self.http_entry = Some(HttpRequestEntry {
            request_method: method,
            request_url: url,
            user_agent,
            remote_ip,
            status: res.status_code,
            referer: referrer,
        });
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn req(mut self, req: Value) -> Self {
        self.req = Some(req);
        self
    }

    pub fn res(mut self, res: Value) -> Self {
        self.res = Some(res);
        self
    }

    pub fn labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn build(self) -> LogRecord {
        let context = if self.http_context.is_some() || self.user.is_some() {
            Some(RecordContext {
                http_request: self.http_context,
                user: self.user,
            })
        } else {
            None
        };

        LogRecord {
            name: self.name,
            pid: std::process::id(),
            level: self.severity,
            time: Utc::now(),
            src: self.src,
            service_context: self.service,
            source_references: vec![self.source],
            context,
            http_request: self.http_entry,
            req: self.req,
            res: self.res,
            body: self.body,
            labels: self.labels,
        }
    }
}
