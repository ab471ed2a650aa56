//! Process-wide initialization. Kept in its own test binary because the
//! global slot can only be filled once per process.

use redacted_log_sink::init::{self, InitOutcome};
use redacted_log_sink::memory_sink::MemorySink;
use redacted_log_sink::{LogArgs, Logger, LoggerConfig, SensitiveFieldSpec, Severity};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn global_logger_is_installed_exactly_once() {
    // Before initialization calls are dropped rather than panicking.
    init::info(json!({"early": true}), LogArgs::new());
    assert!(init::global().is_none());

    let sink = MemorySink::new();
    let builds = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let sink = sink.clone();
        let builds = Arc::clone(&builds);
        let runtime = tokio::runtime::Handle::current();
        handles.push(std::thread::spawn(move || {
            let _entered = runtime.enter();
            init::init_global_with(|| {
                builds.fetch_add(1, Ordering::SeqCst);
                let config = LoggerConfig::default()
                    .with_console_level(None)
                    .with_sensitive_fields(SensitiveFieldSpec::new().mask("secret"));
                Logger::builder(config)
                    .sink(Arc::new(sink), Severity::Info)
                    .build()
            })
            .unwrap()
        }));
    }

    let outcomes: Vec<InitOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outcomes.iter().filter(|o| **o == InitOutcome::Initialized).count(), 1);
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    let again = init::init_global(LoggerConfig::default()).unwrap();
    assert_eq!(again, InitOutcome::AlreadyInitialized);

    init::info(json!({"secret": "s3cr3t", "ok": 1}), LogArgs::new());
    init::debug(json!({"filtered": true}), LogArgs::new());
    init::global().unwrap().shutdown().await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let v = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(v["logPayload"], json!({"secret": "****", "ok": 1}));
}
