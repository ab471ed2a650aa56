use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Discriminator that tells the error-reporting backend a record is a
/// reportable error event.
pub const REPORTED_ERROR_EVENT_TYPE: &str =
    "type.googleapis.com/google.devtools.clouderrorreporting.v1beta1.ReportedErrorEvent";

/// Severity of a log call, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    /// `error` and `fatal` produce reportable error records; every other
    /// level carries an opaque data payload.
    pub fn is_error_level(&self) -> bool {
        matches!(self, Severity::Error | Severity::Fatal)
    }

    /// Severity name understood by Cloud Logging.
    pub fn cloud_severity(&self) -> &'static str {
        match self {
            Severity::Trace | Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" | "critical" => Ok(Severity::Fatal),
            _ => Err(ConfigError::InvalidLevel(s.to_string())),
        }
    }
}

/// Identifies the emitting service in every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContext {
    pub environment: String,
    pub service: String,
    pub version: String,
}

/// Source revision the service was built from. Empty fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
}

/// File and line of the call that produced a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl From<&std::panic::Location<'_>> for SourceLocation {
    fn from(loc: &std::panic::Location<'_>) -> Self {
        SourceLocation {
            file: loc.file().to_string(),
            line: loc.line(),
        }
    }
}

/// Request summary kept under `context.httpRequest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_request: Option<HttpRequestContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Top-level `httpRequest` block in the Cloud Logging `HttpRequest` shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

/// The part of a record that depends on the severity family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordBody {
    Data {
        #[serde(rename = "logPayload")]
        log_payload: Value,
    },
    Error {
        #[serde(rename = "@type")]
        event_type: &'static str,
        message: String,
        err: Value,
    },
}

/// Canonical structured output of a single log call.
///
/// Built once by the formatter, never mutated afterwards and handed to
/// every matching sink by reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub name: String,
    pub pid: u32,
    pub level: Severity,
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<SourceLocation>,
    pub service_context: ServiceContext,
    pub source_references: Vec<SourceReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RecordContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_request: Option<HttpRequestEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res: Option<Value>,
    #[serde(flatten)]
    pub body: RecordBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(body: RecordBody) -> LogRecord {
        LogRecord {
            name: "billing".into(),
            pid: 7,
            level: Severity::Info,
            time: Utc::now(),
            src: None,
            service_context: ServiceContext::default(),
            source_references: vec![SourceReference::default()],
            context: None,
            http_request: None,
            req: None,
            res: None,
            body,
            labels: None,
        }
    }

    #[test]
    fn data_body_flattens_into_log_payload() {
        let rec = record(RecordBody::Data { log_payload: json!({"a": 1}) });
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["logPayload"], json!({"a": 1}));
        assert!(v.get("@type").is_none());
        assert!(v.get("context").is_none());
        assert_eq!(v["level"], json!("info"));
        assert_eq!(v["sourceReferences"], json!([{}]));
    }

    #[test]
    fn error_body_carries_type_discriminator() {
        let rec = record(RecordBody::Error {
            event_type: REPORTED_ERROR_EVENT_TYPE,
            message: "boom".into(),
            err: json!({"message": "boom"}),
        });
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["@type"], json!(REPORTED_ERROR_EVENT_TYPE));
        assert_eq!(v["message"], json!("boom"));
        assert!(v.get("logPayload").is_none());
    }

    #[test]
    fn severity_parses_aliases_and_rejects_garbage() {
        assert_eq!("WARNING".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!(" fatal ".parse::<Severity>().unwrap(), Severity::Fatal);
        assert!("loud".parse::<Severity>().is_err());
        assert!(Severity::Trace < Severity::Fatal);
    }
}
