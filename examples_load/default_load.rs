use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use redacted_log_sink::noop_sink::NoopSink;
use redacted_log_sink::{LogArgs, Logger, LoggerConfig, SensitiveFieldSpec, Severity};

#[tokio::main]
async fn main() {
    let spec = SensitiveFieldSpec::new()
        .mask("password")
        .mask("user.ssn")
        .mask("card.number");
    let config = LoggerConfig::default()
        .with_console_level(None)
        .with_sensitive_fields(spec);

    let logger = Logger::builder(config)
        .sink(Arc::new(NoopSink), Severity::Trace)
        .build()
        .expect("build logger");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        logger.info(
            json!({
                "iteration": i,
                "password": "hunter2",
                "user": {"ssn": "123-45-6789", "name": "Al"},
                "card": {"number": "4111111111111111", "exp": "12/30"},
            }),
            LogArgs::new(),
        );
    }

    let elapsed = start.elapsed();
    println!("default config: formatted {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let stats = logger.stats().snapshot();
    println!("enqueued {} dropped {}", stats.enqueued, stats.dropped);

    // Drain whatever is still queued before exiting.
    logger.shutdown().await;
}
