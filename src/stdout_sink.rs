use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use std::io::Write;

/// Console sink: writes one JSON object per line to stdout.
#[derive(Clone, Default)]
pub struct StdoutSink;

#[async_trait]
impl LogSink for StdoutSink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let line = serde_json::to_string(record)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", line)?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        std::io::stdout().lock().flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}
