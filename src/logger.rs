use serde_json::Value;
use std::panic::Location;
use std::sync::Arc;

use crate::config::LoggerConfig;
use crate::dispatch::{DispatchStats, Disposition, Dispatcher};
use crate::error::ConfigError;
use crate::formatter::{Formatter, LogArgs, LogPayload};
use crate::http::{HttpRequest, HttpResponse};
use crate::record::{Severity, SourceLocation};
use crate::redact::Redactor;
use crate::report::ErrorReport;
use crate::sink::LogSink;
use crate::stdout_sink::StdoutSink;

/// Redacting logging facade.
///
/// Cheap to clone; all clones share one immutable formatter and one
/// dispatcher. Log calls never fail and never block: the record is either
/// suppressed or queued for the configured sinks.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    formatter: Formatter,
    dispatcher: Dispatcher,
}

impl Logger {
    /// Build a logger with the stdout and cloud sinks described by `config`.
    pub fn from_config(config: LoggerConfig) -> Result<Self, ConfigError> {
        LoggerBuilder::new(config).with_configured_sinks()?.build()
    }

    pub fn builder(config: LoggerConfig) -> LoggerBuilder {
        LoggerBuilder::new(config)
    }

    #[track_caller]
    pub fn trace(&self, data: impl Into<Value>, args: LogArgs<'_>) -> Disposition {
        self.log(Severity::Trace, LogPayload::Data(data.into()), args)
    }

    #[track_caller]
    pub fn debug(&self, data: impl Into<Value>, args: LogArgs<'_>) -> Disposition {
        self.log(Severity::Debug, LogPayload::Data(data.into()), args)
    }

    #[track_caller]
    pub fn info(&self, data: impl Into<Value>, args: LogArgs<'_>) -> Disposition {
        self.log(Severity::Info, LogPayload::Data(data.into()), args)
    }

    #[track_caller]
    pub fn warn(&self, data: impl Into<Value>, args: LogArgs<'_>) -> Disposition {
        self.log(Severity::Warn, LogPayload::Data(data.into()), args)
    }

    #[track_caller]
    pub fn error(&self, err: impl Into<ErrorReport>, args: LogArgs<'_>) -> Disposition {
        self.log(Severity::Error, LogPayload::Error(err.into()), args)
    }

    #[track_caller]
    pub fn fatal(&self, err: impl Into<ErrorReport>, args: LogArgs<'_>) -> Disposition {
        self.log(Severity::Fatal, LogPayload::Error(err.into()), args)
    }

    #[deprecated(note = "use `Logger::error` instead")]
    #[track_caller]
    pub fn report_error(
        &self,
        err: impl Into<ErrorReport>,
        req: Option<&HttpRequest>,
        res: Option<&HttpResponse>,
        user: Option<&str>,
    ) {
        let args = LogArgs {
            request: req,
            response: res,
            user,
            ..LogArgs::default()
        };
        self.log(Severity::Error, LogPayload::Error(err.into()), args);
    }

    /// Entry point behind the per-severity methods, which pair data payloads
    /// with `trace..warn` and error payloads with `error`/`fatal`.
    #[track_caller]
    pub(crate) fn log(&self, severity: Severity, payload: LogPayload, args: LogArgs<'_>) -> Disposition {
        let src = SourceLocation::from(Location::caller());
        self.log_at(severity, payload, args, Some(src))
    }

    /// Like `log` with an explicit source location.
    pub(crate) fn log_at(
        &self,
        severity: Severity,
        payload: LogPayload,
        args: LogArgs<'_>,
        src: Option<SourceLocation>,
    ) -> Disposition {
        let formatted = self.inner.formatter.format(severity, payload, &args, src);
        self.inner.dispatcher.dispatch(formatted)
    }

    pub fn redactor(&self) -> &Arc<Redactor> {
        self.inner.formatter.redactor()
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        self.inner.dispatcher.stats()
    }

    /// Deliver queued records, flush every sink and stop the background
    /// tasks. Later log calls are dropped.
    pub async fn shutdown(&self) {
        self.inner.dispatcher.shutdown().await;
    }
}

/// Wires a [`Logger`] from a [`LoggerConfig`] plus any extra sinks.
pub struct LoggerBuilder {
    config: LoggerConfig,
    sinks: Vec<(Arc<dyn LogSink>, Severity)>,
}

impl LoggerBuilder {
    pub fn new(config: LoggerConfig) -> Self {
        LoggerBuilder {
            config,
            sinks: Vec::new(),
        }
    }

    /// Add a sink receiving records at `min_level` or above.
    pub fn sink(mut self, sink: Arc<dyn LogSink>, min_level: Severity) -> Self {
        self.sinks.push((sink, min_level));
        self
    }

    /// Add the stdout and cloud sinks enabled in the configuration.
    pub fn with_configured_sinks(mut self) -> Result<Self, ConfigError> {
        if let Some(level) = self.config.console_level {
            self.sinks.push((Arc::new(StdoutSink), level));
        }

        if let Some(level) = self.config.cloud_level {
            #[cfg(feature = "cloud")]
            {
                use crate::cloud::{CloudLoggingConfig, CloudLoggingSink};

                let project_id = self
                    .config
                    .project_id
                    .clone()
                    .ok_or(ConfigError::MissingProjectId)?;
                let mut cloud = CloudLoggingConfig::new(project_id, self.config.effective_log_name());
                cloud.access_token = self.config.access_token.clone();

                let sink = CloudLoggingSink::new(cloud)?;
                self.sinks.push((Arc::new(sink), level));
            }

            #[cfg(not(feature = "cloud"))]
            {
                let _ = level;
                return Err(ConfigError::CloudFeatureDisabled);
            }
        }

        Ok(self)
    }

    pub fn build(self) -> Result<Logger, ConfigError> {
        let redactor = Arc::new(Redactor::new(&self.config.sensitive_fields)?);
        let formatter = Formatter::new(self.config.service, self.config.source, redactor);

        let mut dispatcher = Dispatcher::new();
        for (sink, level) in self.sinks {
            dispatcher.add_sink(sink, level, self.config.channel_buffer)?;
        }

        tracing::debug!(
            target: "redacted_log_sink",
            sinks = dispatcher.route_count(),
            redacted_paths = formatter.redactor().rules().len(),
            "logger initialized"
        );

        Ok(Logger {
            inner: Arc::new(LoggerInner {
                formatter,
                dispatcher,
            }),
        })
    }
}
