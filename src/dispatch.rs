use crate::error::ConfigError;
use crate::formatter::FormattedRecord;
use crate::record::{LogRecord, Severity};
use crate::sink::LogSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

tokio::task_local! {
    static SINK_TASK: &'static str;
}

/// Name of the sink whose delivery task is currently running, if any.
/// `tracing` events emitted from inside a sink (its HTTP client, say) are
/// recognised by this and never turned back into records.
pub fn current_sink_task() -> Option<&'static str> {
    SINK_TASK.try_with(|name| *name).ok()
}

/// Final state of a log call once its record has been built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// `skipLog` was requested; no sink saw the record.
    Suppressed,
    /// Handed to every sink whose minimum level the record meets.
    Dispatched { routes: usize },
}

/// Counters kept by a [`Dispatcher`].
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Records offered to the dispatcher, suppressed ones included.
    pub total: AtomicU64,
    pub suppressed: AtomicU64,
    /// Successfully enqueued into a sink channel (counted per sink).
    pub enqueued: AtomicU64,
    /// Dropped because a sink channel was full or closed.
    pub dropped: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total: u64,
    pub suppressed: u64,
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

struct Route {
    sink_name: &'static str,
    min_level: Severity,
    sender: mpsc::Sender<Arc<LogRecord>>,
}

/// Fans finished records out to sinks without blocking the caller.
///
/// Every sink gets its own bounded channel and background task, so a slow
/// backend only ever drops its own records. Sink failures are reported as
/// diagnostics and never reach the code that made the log call.
pub struct Dispatcher {
    routes: Vec<Route>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    stats: Arc<DispatchStats>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Dispatcher {
            routes: Vec::new(),
            tasks: Mutex::new(Vec::new()),
            shutdown,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Register a sink receiving every record at `min_level` or above, and
    /// spawn the task that drains its channel.
    ///
    /// Must be called from within a Tokio runtime. `buffer` is raised to at
    /// least 16 to avoid degenerate configurations.
    pub fn add_sink(
        &mut self,
        sink: Arc<dyn LogSink>,
        min_level: Severity,
        buffer: usize,
    ) -> Result<(), ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        let (tx, mut rx) = mpsc::channel::<Arc<LogRecord>>(buffer.max(16));
        let mut shutdown_rx = self.shutdown.subscribe();
        let stats = Arc::clone(&self.stats);
        let sink_name = sink.name();

        let task = async move {
            loop {
                tokio::select! {
                    next = rx.recv() => match next {
                        Some(record) => deliver(&*sink, &record, &stats).await,
                        None => break,
                    },
                    _ = shutdown_rx.changed() => {
                        // Stop accepting, then drain what is already queued.
                        rx.close();
                        while let Some(record) = rx.recv().await {
                            deliver(&*sink, &record, &stats).await;
                        }
                        break;
                    }
                }
            }

            if let Err(e) = sink.flush().await {
                tracing::warn!(target: "redacted_log_sink", sink = sink.name(), error = %e, "log sink flush failed");
            }
        };
        let handle = runtime.spawn(SINK_TASK.scope(sink_name, task));

        self.routes.push(Route {
            sink_name,
            min_level,
            sender: tx,
        });
        self.lock_tasks().push(handle);
        Ok(())
    }

    /// Apply the suppression decision and enqueue the record on every
    /// matching route. Never blocks.
    pub fn dispatch(&self, formatted: FormattedRecord) -> Disposition {
        self.stats.total.fetch_add(1, Ordering::Relaxed);
        if formatted.suppressed {
            self.stats.suppressed.fetch_add(1, Ordering::Relaxed);
            return Disposition::Suppressed;
        }

        let record = Arc::new(formatted.record);
        let mut routes = 0;
        for route in self.routes.iter().filter(|r| record.level >= r.min_level) {
            match route.sender.try_send(Arc::clone(&record)) {
                Ok(()) => {
                    self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                    routes += 1;
                }
                Err(_) => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(target: "redacted_log_sink", sink = route.sink_name, "log channel full or closed, dropping log record");
                }
            }
        }
        Disposition::Dispatched { routes }
    }

    /// Stop accepting records, deliver everything already queued, flush each
    /// sink and wait for the background tasks to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let tasks: Vec<_> = self.lock_tasks().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(target: "redacted_log_sink", error = %e, "log sink task failed");
            }
        }
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn deliver(sink: &dyn LogSink, record: &LogRecord, stats: &DispatchStats) {
    match sink.send(record).await {
        Ok(()) => {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(target: "redacted_log_sink", sink = sink.name(), error = %e, "log sink send failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::RecordBuilder;
    use crate::memory_sink::MemorySink;
    use crate::record::RecordBody;
    use async_trait::async_trait;
    use serde_json::json;
    use std::error::Error;

    fn formatted(level: Severity, suppressed: bool) -> FormattedRecord {
        let record = RecordBuilder::new(
            "svc".into(),
            level,
            RecordBody::Data { log_payload: json!({"n": 1}) },
        )
        .build();
        FormattedRecord { record, suppressed }
    }

    struct FailingSink;

    #[async_trait]
    impl LogSink for FailingSink {
        async fn send(&self, _record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("backend unavailable".into())
        }
    }

    #[tokio::test]
    async fn routes_by_minimum_level() {
        let console = MemorySink::new();
        let cloud = MemorySink::new();
        let mut d = Dispatcher::new();
        d.add_sink(Arc::new(console.clone()), Severity::Error, 64).unwrap();
        d.add_sink(Arc::new(cloud.clone()), Severity::Info, 64).unwrap();

        assert_eq!(d.dispatch(formatted(Severity::Debug, false)), Disposition::Dispatched { routes: 0 });
        assert_eq!(d.dispatch(formatted(Severity::Info, false)), Disposition::Dispatched { routes: 1 });
        assert_eq!(d.dispatch(formatted(Severity::Fatal, false)), Disposition::Dispatched { routes: 2 });
        d.shutdown().await;

        assert_eq!(console.len(), 1);
        assert_eq!(cloud.len(), 2);
        let stats = d.stats().snapshot();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.enqueued, 3);
        assert_eq!(stats.delivered, 3);
    }

    #[tokio::test]
    async fn suppressed_records_never_reach_a_sink() {
        let sink = MemorySink::new();
        let mut d = Dispatcher::new();
        d.add_sink(Arc::new(sink.clone()), Severity::Trace, 64).unwrap();

        assert_eq!(d.dispatch(formatted(Severity::Fatal, true)), Disposition::Suppressed);
        d.shutdown().await;

        assert!(sink.is_empty());
        assert_eq!(d.stats().snapshot().suppressed, 1);
    }

    #[tokio::test]
    async fn sink_failures_are_counted_not_raised() {
        let mut d = Dispatcher::new();
        d.add_sink(Arc::new(FailingSink), Severity::Trace, 64).unwrap();
        assert_eq!(d.dispatch(formatted(Severity::Error, false)), Disposition::Dispatched { routes: 1 });
        d.shutdown().await;
        assert_eq!(d.stats().snapshot().failed, 1);
    }

    #[tokio::test]
    async fn records_after_shutdown_are_dropped() {
        let sink = MemorySink::new();
        let mut d = Dispatcher::new();
        d.add_sink(Arc::new(sink.clone()), Severity::Trace, 64).unwrap();
        d.shutdown().await;

        assert_eq!(d.dispatch(formatted(Severity::Info, false)), Disposition::Dispatched { routes: 0 });
        assert_eq!(d.stats().snapshot().dropped, 1);
        assert!(sink.is_empty());
    }

    struct ScopeRecordingSink(Arc<Mutex<Vec<Option<&'static str>>>>);

    #[async_trait]
    impl LogSink for ScopeRecordingSink {
        async fn send(&self, _record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.0.lock().unwrap().push(current_sink_task());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "marked"
        }
    }

    #[tokio::test]
    async fn delivery_runs_inside_the_sink_task_scope() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut d = Dispatcher::new();
        d.add_sink(Arc::new(ScopeRecordingSink(Arc::clone(&seen))), Severity::Trace, 16).unwrap();

        assert_eq!(current_sink_task(), None);
        d.dispatch(formatted(Severity::Info, false));
        d.shutdown().await;

        assert_eq!(*seen.lock().unwrap(), vec![Some("marked")]);
    }

    #[test]
    fn adding_a_sink_requires_a_runtime() {
        let mut d = Dispatcher::new();
        let err = d.add_sink(Arc::new(MemorySink::new()), Severity::Info, 8).unwrap_err();
        assert!(matches!(err, ConfigError::NoRuntime));
    }
}
