//! End-to-end behaviour of `Logger`: formatting, redaction, suppression and
//! dispatch through an in-memory sink.

use redacted_log_sink::dispatch::Disposition;
use redacted_log_sink::memory_sink::MemorySink;
use redacted_log_sink::record::{RecordBody, ServiceContext, SourceReference, REPORTED_ERROR_EVENT_TYPE};
use redacted_log_sink::{
    ErrorReport, HttpRequest, HttpResponse, LogArgs, Logger, LoggerConfig, SensitiveFieldSpec, Severity,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

fn config(spec: SensitiveFieldSpec) -> LoggerConfig {
    LoggerConfig::new(ServiceContext {
        environment: "staging".into(),
        service: "checkout".into(),
        version: "2.4.0".into(),
    })
    .with_console_level(None)
    .with_source(SourceReference {
        repository: Some("https://git.example.com/checkout".into()),
        revision_id: Some("9f1c2e".into()),
    })
    .with_sensitive_fields(spec)
}

fn logger_with(spec: SensitiveFieldSpec) -> (Logger, MemorySink) {
    let sink = MemorySink::new();
    let logger = Logger::builder(config(spec))
        .sink(Arc::new(sink.clone()), Severity::Trace)
        .build()
        .unwrap();
    (logger, sink)
}

fn as_json(sink: &MemorySink) -> Vec<Value> {
    sink.records()
        .iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect()
}

#[tokio::test]
async fn every_severity_produces_the_matching_shape() {
    let (logger, sink) = logger_with(SensitiveFieldSpec::new());

    logger.trace(json!({"step": "t"}), LogArgs::new());
    logger.debug(json!({"step": "d"}), LogArgs::new());
    logger.info(json!({"step": "i"}), LogArgs::new());
    logger.warn(json!({"step": "w"}), LogArgs::new());
    logger.error(ErrorReport::from_message("e"), LogArgs::new());
    logger.fatal(ErrorReport::from_message("f"), LogArgs::new());
    logger.shutdown().await;

    let records = as_json(&sink);
    assert_eq!(records.len(), 6);
    for (record, level) in records.iter().zip(Severity::ALL) {
        assert_eq!(record["level"], json!(level.as_str()));
        if level.is_error_level() {
            assert_eq!(record["@type"], json!(REPORTED_ERROR_EVENT_TYPE));
            assert!(record["message"].is_string());
            assert!(record.get("logPayload").is_none());
        } else {
            assert!(record.get("@type").is_none());
            assert!(record.get("logPayload").is_some());
        }
        assert_eq!(record["serviceContext"]["service"], json!("checkout"));
        assert_eq!(
            record["sourceReferences"],
            json!([{"repository": "https://git.example.com/checkout", "revisionId": "9f1c2e"}])
        );
        assert!(record["src"]["file"].as_str().unwrap().ends_with("logger_integration.rs"));
    }
}

#[tokio::test]
async fn skip_log_never_reaches_the_sink() {
    let (logger, sink) = logger_with(SensitiveFieldSpec::new());

    logger.info(json!({"password": "x"}), LogArgs::new().skip_log(true));
    logger.warn(json!({"skipLog": true, "note": "logged upstream"}), LogArgs::new());
    logger.error(ErrorReport::from_message("dup").with_skip_log(true), LogArgs::new());
    logger.fatal(ErrorReport::from_message("flag"), LogArgs::new().skip_log(true));
    assert_eq!(
        logger.debug(json!({"skipLog": "yes"}), LogArgs::new()),
        Disposition::Suppressed
    );
    assert_eq!(
        logger.info(json!({"skipLog": false}), LogArgs::new()),
        Disposition::Dispatched { routes: 1 }
    );
    logger.shutdown().await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].body,
        RecordBody::Data { log_payload: json!({"skipLog": false}) }
    );
    assert_eq!(logger.stats().snapshot().suppressed, 5);
}

#[tokio::test]
async fn request_response_and_payload_are_redacted_independently() {
    let spec = SensitiveFieldSpec::from_json(&json!({
        "headers": {"authorization": true, "cookie": true},
        "body": {"password": true},
        "user": {"ssn": true},
    }))
    .unwrap()
    .transform("token", |v| {
        let head: String = v.as_str().unwrap_or_default().chars().take(4).collect();
        json!(format!("{head}…"))
    });
    let (logger, sink) = logger_with(spec);

    let req = HttpRequest::from_value(&json!({
        "method": "POST",
        "originalUrl": "/v1/login?next=%2F",
        "headers": {"Authorization": "Bearer abc", "User-Agent": "app/3.1", "x-forwarded-for": "198.51.100.23, 10.0.0.8"},
        "body": {"username": "al", "password": "pw"},
        "connection": {"remoteAddress": "10.0.0.8", "remotePort": 51000},
    }));
    let res = HttpResponse::new(401)
        .with_status_message("Unauthorized")
        .with_header("Set-Cookie", "sid=1")
        .with_body(json!({"error": "bad credentials", "password": "echoed"}));
    let labels = BTreeMap::from([("flow".to_string(), "login".to_string())]);

    logger.warn(
        json!({"user": {"ssn": "123-45-6789", "name": "Al"}, "token": "abcdef123456"}),
        LogArgs::new().http(&req, &res).user("al@example.com").labels(&labels),
    );
    logger.shutdown().await;

    let record = &as_json(&sink)[0];
    assert_eq!(
        record["logPayload"],
        json!({"user": {"ssn": "****", "name": "Al"}, "token": "abcd…"})
    );
    assert_eq!(record["req"]["headers"]["authorization"], json!("****"));
    assert_eq!(record["req"]["headers"]["user-agent"], json!("app/3.1"));
    assert_eq!(record["req"]["body"], json!({"username": "al", "password": "****"}));
    assert_eq!(record["req"]["url"], json!("/v1/login?next=%2F"));
    assert_eq!(record["req"]["remotePort"], json!(51000));
    assert_eq!(record["res"]["body"], json!({"error": "bad credentials", "password": "****"}));
    assert_eq!(record["res"]["headers"], json!({"set-cookie": "sid=1"}));
    assert_eq!(record["res"]["statusMessage"], json!("Unauthorized"));

    assert_eq!(record["context"]["user"], json!("al@example.com"));
    assert_eq!(record["context"]["httpRequest"]["remoteIp"], json!("198.51.100.23"));
    assert_eq!(record["httpRequest"]["remoteIp"], json!("198.51.100.23"));
    assert_eq!(record["httpRequest"]["status"], json!(401));
    assert_eq!(record["httpRequest"]["requestUrl"], record["context"]["httpRequest"]["url"]);
    assert_eq!(record["labels"], json!({"flow": "login"}));
}

#[tokio::test]
async fn omitted_sections_stay_absent() {
    let (logger, sink) = logger_with(SensitiveFieldSpec::new());
    let res = HttpResponse::new(500);

    logger.info(json!("plain"), LogArgs::new());
    logger.info(json!("half"), LogArgs::new().response(&res));
    logger.shutdown().await;

    for record in as_json(&sink) {
        assert!(record.get("context").is_none());
        assert!(record.get("httpRequest").is_none());
        assert!(record.get("req").is_none());
        assert!(record.get("labels").is_none());
    }
}

#[tokio::test]
async fn error_records_carry_source_chain() {
    #[derive(Debug, thiserror::Error)]
    #[error("payment declined")]
    struct Declined(#[source] std::io::Error);

    let (logger, sink) = logger_with(SensitiveFieldSpec::new().mask("message"));
    let err = Declined(std::io::Error::new(std::io::ErrorKind::Other, "gateway timeout"));
    logger.error(&err, LogArgs::new().user("u-1"));
    logger.shutdown().await;

    let record = &as_json(&sink)[0];
    assert_eq!(record["message"], json!("Declined: payment declined"));
    assert_eq!(record["err"]["name"], json!("Declined"));
    assert_eq!(record["err"]["message"], json!("payment declined"));
    assert_eq!(record["err"]["causes"], json!(["gateway timeout"]));
    assert_eq!(record["context"], json!({"user": "u-1"}));
}

#[tokio::test]
async fn failing_transform_does_not_break_the_call() {
    let spec = SensitiveFieldSpec::new()
        .transform("card", |_| panic!("bad transform"))
        .mask("cvv");
    let (logger, sink) = logger_with(spec);

    logger.info(json!({"card": "4111", "cvv": "123"}), LogArgs::new());
    logger.shutdown().await;

    let record = &as_json(&sink)[0];
    assert_eq!(record["logPayload"], json!({"card": "4111", "cvv": "****"}));
    assert_eq!(logger.redactor().fail_open_count(), 1);
}

#[tokio::test]
async fn cloud_sink_without_project_is_a_config_error() {
    let config = config(SensitiveFieldSpec::new()).with_cloud_level(Some(Severity::Info));
    let err = Logger::from_config(config).err().unwrap();
    let msg = err.to_string();
    assert!(msg.contains("project id") || msg.contains("cloud feature"), "{msg}");
}

#[tokio::test]
async fn invalid_spec_is_a_config_error() {
    let config = config(SensitiveFieldSpec::new().mask("a..b"));
    assert!(Logger::from_config(config).is_err());
}
