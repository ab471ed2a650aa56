use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for finished [`LogRecord`]s.
///
/// Implementations transport records to a concrete backend (stdout, Cloud
/// Logging, an in-memory buffer, etc). The dispatcher calls `send` from a
/// background task owned by the sink's route and never awaits it on the
/// thread that made the log call.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single log record to the underlying backend.
    ///
    /// **Parameters**
    /// - `record`: redacted [`LogRecord`] produced by the formatter.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted by the backend.
    /// - `Err(..)` if the backend failed (network error, serialization
    ///   error, HTTP status, etc.). The dispatcher reports the failure as a
    ///   diagnostic and moves on to the next record; it does not retry.
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered records, if the backend implements buffering.
    ///
    /// Called once when the dispatcher shuts down. Default implementation
    /// is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str {
        "sink"
    }
}
