use crate::config::LoggerConfig;
use crate::error::ConfigError;
use crate::formatter::{LogArgs, LogPayload};
use crate::layer::RedactingLayer;
use crate::logger::Logger;
use crate::record::Severity;
use crate::report::ErrorReport;
use serde_json::Value;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

static GLOBAL: OnceLock<Logger> = OnceLock::new();
static INIT_GUARD: Mutex<()> = Mutex::new(());

/// Result of a successful [`init_global`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// This call built and installed the process-wide logger.
    Initialized,
    /// A logger was already installed; it was left untouched and the
    /// configuration passed to this call was ignored.
    AlreadyInitialized,
}

/// Install the process-wide logger exactly once.
///
/// Concurrent first calls are serialized: exactly one builds the logger and
/// wires its sinks, every other call returns
/// [`InitOutcome::AlreadyInitialized`]. A failed build leaves the global
/// slot empty so a later call may retry with a corrected configuration.
///
/// Must be called from within a Tokio runtime.
pub fn init_global(config: LoggerConfig) -> Result<InitOutcome, ConfigError> {
    init_global_with(|| Logger::from_config(config))
}

/// Like [`init_global`] with a caller-supplied constructor, e.g. one built
/// with [`Logger::builder`] and custom sinks. `build` only runs when no
/// logger is installed yet.
pub fn init_global_with<F>(build: F) -> Result<InitOutcome, ConfigError>
where
    F: FnOnce() -> Result<Logger, ConfigError>,
{
    if GLOBAL.get().is_some() {
        return Ok(InitOutcome::AlreadyInitialized);
    }

    let _guard = INIT_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if GLOBAL.get().is_some() {
        return Ok(InitOutcome::AlreadyInitialized);
    }

    let logger = build()?;
    match GLOBAL.set(logger) {
        Ok(()) => Ok(InitOutcome::Initialized),
        Err(_) => Ok(InitOutcome::AlreadyInitialized),
    }
}

/// The process-wide logger, if [`init_global`] succeeded.
pub fn global() -> Option<&'static Logger> {
    GLOBAL.get()
}

#[track_caller]
fn with_global(severity: Severity, payload: LogPayload, args: LogArgs<'_>) {
    match GLOBAL.get() {
        Some(logger) => {
            logger.log(severity, payload, args);
        }
        None => {
            tracing::warn!(target: "redacted_log_sink", level = %severity, "log call before init_global, record dropped");
        }
    }
}

/// Log through the global logger; a no-op before initialization.
#[track_caller]
pub fn trace(data: impl Into<Value>, args: LogArgs<'_>) {
    with_global(Severity::Trace, LogPayload::Data(data.into()), args);
}

#[track_caller]
pub fn debug(data: impl Into<Value>, args: LogArgs<'_>) {
    with_global(Severity::Debug, LogPayload::Data(data.into()), args);
}

#[track_caller]
pub fn info(data: impl Into<Value>, args: LogArgs<'_>) {
    with_global(Severity::Info, LogPayload::Data(data.into()), args);
}

#[track_caller]
pub fn warn(data: impl Into<Value>, args: LogArgs<'_>) {
    with_global(Severity::Warn, LogPayload::Data(data.into()), args);
}

#[track_caller]
pub fn error(err: impl Into<ErrorReport>, args: LogArgs<'_>) {
    with_global(Severity::Error, LogPayload::Error(err.into()), args);
}

#[track_caller]
pub fn fatal(err: impl Into<ErrorReport>, args: LogArgs<'_>) {
    with_global(Severity::Fatal, LogPayload::Error(err.into()), args);
}

/// Settings for [`init_tracing_with_config`].
///
/// **Fields**
/// - `min_level`: lowest `tracing` level forwarded to the logger.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added next to the [`RedactingLayer`]. Leave it off when the logger
///   already has a console sink, or events are printed twice.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub min_level: Severity,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_level: Severity::Info,
            enable_stdout: false,
        }
    }
}

/// Install a global `tracing` subscriber that forwards events to `logger`.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`RedactingLayer`] as the global
/// default subscriber, so `tracing` events anywhere in the process become
/// redacted records.
pub fn init_tracing_with_config(logger: Logger, config: LayerConfig) -> Result<(), ConfigError> {
    let layer = RedactingLayer::new(logger, config.min_level);

    // Two branches because the subscriber type differs with the extra layer.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Equivalent to [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(logger: Logger) -> Result<(), ConfigError> {
    init_tracing_with_config(logger, LayerConfig::default())
}
