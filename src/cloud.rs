use crate::record::{HttpRequestEntry, LogRecord};
use crate::sink::LogSink;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::error::Error;

/// Default `entries:write` endpoint of the Cloud Logging v2 API.
pub const DEFAULT_ENTRIES_ENDPOINT: &str = "https://logging.googleapis.com/v2/entries:write";

/// Configuration for [`CloudLoggingSink`].
#[derive(Clone, Debug)]
pub struct CloudLoggingConfig {
    pub project_id: String,
    /// Log name inside the project; URL-encoded when the request is built.
    pub log_name: String,
    /// Monitored resource type attached to every entry.
    pub resource_type: String,
    /// OAuth access token sent as a bearer token, if any. Obtaining and
    /// refreshing the token is the caller's business.
    pub access_token: Option<String>,
    pub endpoint: String,
}

impl CloudLoggingConfig {
    pub fn new(project_id: impl Into<String>, log_name: impl Into<String>) -> Self {
        CloudLoggingConfig {
            project_id: project_id.into(),
            log_name: log_name.into(),
            resource_type: "global".to_string(),
            access_token: None,
            endpoint: DEFAULT_ENTRIES_ENDPOINT.to_string(),
        }
    }
}

/// Ships records to Cloud Logging, one `entries:write` call per record.
///
/// The record becomes the entry's `jsonPayload`; `labels` and
/// `httpRequest` are promoted to the matching entry fields so they can be
/// filtered on in the console.
#[derive(Clone)]
pub struct CloudLoggingSink {
    client: Client,
    config: CloudLoggingConfig,
}

impl CloudLoggingSink {
    pub fn new(config: CloudLoggingConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }

    /// Fully qualified log name, e.g. `projects/p/logs/my%2Fapp`.
    pub fn log_name_path(&self) -> String {
        format!(
            "projects/{}/logs/{}",
            self.config.project_id,
            urlencoding::encode(&self.config.log_name)
        )
    }

    fn map_record<'a>(&self, record: &'a LogRecord) -> Result<WriteRequest<'a>, serde_json::Error> {
        let mut payload = serde_json::to_value(record)?;
        if let Value::Object(map) = &mut payload {
            map.remove("labels");
            map.remove("httpRequest");
        }

        let entry = CloudEntry {
            severity: record.level.cloud_severity(),
            timestamp: record.time.to_rfc3339(),
            json_payload: payload,
            labels: record.labels.as_ref(),
            http_request: record.http_request.as_ref(),
            source_location: record.src.as_ref().map(|src| {
                json!({"file": src.file, "line": src.line.to_string()})
            }),
        };

        Ok(WriteRequest {
            log_name: self.log_name_path(),
            resource: json!({
                "type": self.config.resource_type,
                "labels": {"project_id": self.config.project_id},
            }),
            entries: vec![entry],
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteRequest<'a> {
    log_name: String,
    resource: Value,
    entries: Vec<CloudEntry<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CloudEntry<'a> {
    severity: &'static str,
    timestamp: String,
    json_payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_request: Option<&'a HttpRequestEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_location: Option<Value>,
}

#[async_trait]
impl LogSink for CloudLoggingSink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let body = self.map_record(record)?;
        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("Cloud Logging write failed with status {}: {}", status, text).into())
        }
    }

    fn name(&self) -> &'static str {
        "cloud"
    }
}
