use crate::dispatch::current_sink_task;
use crate::formatter::{LogArgs, LogPayload};
use crate::logger::Logger;
use crate::record::{Severity, SourceLocation};
use crate::report::ErrorReport;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Target used by this crate's own diagnostics. Events with this target are
/// never fed back into the logger.
pub const DIAGNOSTICS_TARGET: &str = "redacted_log_sink";

/// Crates whose events are ignored by default. The cloud sink's HTTP stack
/// logs from connection tasks of its own, outside any sink task.
pub const DEFAULT_IGNORED_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

/// `tracing_subscriber` layer that turns `tracing` events into log calls
/// on a [`Logger`], so they are redacted and shaped like any other record.
///
/// Event fields become the data payload (`message` included). Two field
/// names are interpreted instead of copied: `user` (a string) fills the
/// record's user context and `skip_log` (a bool) suppresses the record.
/// `ERROR` events become reportable errors built from the message, with the
/// remaining fields as error details.
///
/// Events emitted while a sink is delivering a record are dropped, as are
/// events from the crates in `ignored_targets`. Either would otherwise
/// produce a new record for every record sent.
pub struct RedactingLayer {
    logger: Logger,
    min_level: Severity,
    ignored_targets: Vec<String>,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events forwarded to the logger.
    pub forwarded_events: Arc<AtomicU64>,
}

impl RedactingLayer {
    pub fn new(logger: Logger, min_level: Severity) -> Self {
        RedactingLayer {
            logger,
            min_level,
            ignored_targets: DEFAULT_IGNORED_TARGETS.iter().map(|t| t.to_string()).collect(),
            total_events: Arc::new(AtomicU64::new(0)),
            forwarded_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Also ignore events from `crate_name` and its modules.
    pub fn ignore_target(mut self, crate_name: impl Into<String>) -> Self {
        self.ignored_targets.push(crate_name.into());
        self
    }

    fn is_ignored(&self, target: &str) -> bool {
        target == DIAGNOSTICS_TARGET
            || self.ignored_targets.iter().any(|ignored| {
                target
                    .strip_prefix(ignored.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
            })
    }
}

fn severity_of(level: &Level) -> Severity {
    match *level {
        Level::TRACE => Severity::Trace,
        Level::DEBUG => Severity::Debug,
        Level::INFO => Severity::Info,
        Level::WARN => Severity::Warn,
        _ => Severity::Error,
    }
}

impl<S> Layer<S> for RedactingLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if self.is_ignored(meta.target()) || current_sink_task().is_some() {
            return;
        }
        let severity = severity_of(meta.level());
        if severity < self.min_level {
            return;
        }

        let mut fields = Map::new();
        let mut user: Option<String> = None;
        let mut skip_log = false;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            user: &mut user,
            skip_log: &mut skip_log,
        };
        event.record(&mut visitor);

        let payload = if severity.is_error_level() {
            let message = fields
                .remove("message")
                .and_then(|m| m.as_str().map(str::to_string))
                .unwrap_or_else(|| meta.name().to_string());
            let mut report = ErrorReport::from_message(message);
            if !fields.is_empty() {
                report = report.with_details(Value::Object(fields));
            }
            LogPayload::Error(report)
        } else {
            LogPayload::Data(Value::Object(fields))
        };

        let mut args = LogArgs::new().skip_log(skip_log);
        if let Some(user) = user.as_deref() {
            args = args.user(user);
        }

        let src = match (meta.file(), meta.line()) {
            (Some(file), Some(line)) => Some(SourceLocation {
                file: file.to_string(),
                line,
            }),
            _ => None,
        };

        self.logger.log_at(severity, payload, args, src);
        self.forwarded_events.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Map<String, Value>,
    pub user: &'a mut Option<String>,
    pub skip_log: &'a mut bool,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "user" {
            *self.user = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "skip_log" {
            *self.skip_log = value;
        } else {
            self.fields.insert(field.name().to_string(), Value::from(value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields.insert(field.name().to_string(), Value::String(format!("{:?}", value)));
    }
}
