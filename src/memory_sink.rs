use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// Keeps every record it receives. Clones share the same buffer, so a test
/// can hand one clone to the logger and inspect another.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.records
            .lock()
            .map_err(|_| "memory sink lock poisoned")?
            .push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
