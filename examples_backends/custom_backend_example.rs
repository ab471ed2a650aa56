use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use redacted_log_sink::{
    record::LogRecord,
    sink::LogSink,
    ErrorReport, HttpRequest, HttpResponse, LogArgs, Logger, LoggerConfig, SensitiveFieldSpec, Severity,
};

/// Example of integrating a completely custom backend by implementing
/// the `LogSink` trait directly. Imagine this talks to some
/// proprietary DB for which this crate does not provide a built-in
/// sink.
struct MyCustomDbSink;

#[async_trait]
impl LogSink for MyCustomDbSink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Here you would call your own client library for the target DB.
        // For the sake of example we just print the record.
        println!("[my-custom-db] {}", serde_json::to_string(record)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let config = LoggerConfig::default()
        .with_console_level(None)
        .with_sensitive_fields(SensitiveFieldSpec::new().mask("headers.authorization").mask("body.password"));

    let logger = Logger::builder(config)
        .sink(Arc::new(MyCustomDbSink), Severity::Info)
        .build()
        .expect("build logger");

    let req = HttpRequest::new("POST", "/login")
        .with_header("Authorization", "Bearer secret-token")
        .with_body(json!({"username": "al", "password": "pw"}))
        .with_peer("127.0.0.1:50123".parse().expect("socket addr"));
    let res = HttpResponse::new(500);

    logger.info(json!({"db": "my-custom-db", "event": "started"}), LogArgs::new());
    logger.error(
        ErrorReport::from_message("simulated error sent via custom backend"),
        LogArgs::new().http(&req, &res).user("al"),
    );

    logger.shutdown().await;
}
