//! HTTP request/response views accepted by log calls.
//!
//! Both types can be filled in directly by framework glue code or extracted
//! from a loosely shaped JSON object with `from_value`.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Incoming request as seen by the logger.
///
/// Header names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequest {
    pub method: Option<String>,
    /// Original request URL, query string included.
    pub url: Option<String>,
    /// Routed path, used when no URL is known.
    pub path: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    /// Peer address of the underlying connection.
    pub remote_address: Option<String>,
    pub remote_port: Option<u16>,
    /// Address reported by the framework when the connection is not
    /// directly visible (e.g. behind an adapter).
    pub info_remote_address: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        HttpRequest {
            method: Some(method.into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.remote_address = Some(peer.ip().to_string());
        self.remote_port = Some(peer.port());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Client address: first hop of `x-forwarded-for`, then the connection
    /// peer, then the framework-provided address. Blank values are skipped.
    pub fn remote_ip(&self) -> Option<&str> {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|h| h.split(',').next())
            .map(str::trim);

        [forwarded, self.remote_address.as_deref(), self.info_remote_address.as_deref()]
            .into_iter()
            .flatten()
            .find(|ip| !ip.trim().is_empty())
    }

    /// URL reported in the request context; falls back to the routed path.
    pub fn display_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.path.as_deref())
    }

    pub fn referrer(&self) -> Option<&str> {
        self.header("referer").or_else(|| self.header("referrer"))
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    /// Extract a request from a loosely shaped object.
    ///
    /// Recognized fields: `method`, `originalUrl`/`url` (textual only),
    /// `path`, `headers`, `body`/`payload`, `connection.remoteAddress`,
    /// `connection.remotePort` and `info.remoteAddress`. Anything else is
    /// ignored; a non-object yields an empty request.
    pub fn from_value(value: &Value) -> Self {
        HttpRequest {
            method: text_at(value, "/method"),
            url: text_at(value, "/originalUrl").or_else(|| text_at(value, "/url")),
            path: text_at(value, "/path"),
            headers: headers_at(value, "/headers"),
            body: present_at(value, "/body").or_else(|| present_at(value, "/payload")),
            remote_address: text_at(value, "/connection/remoteAddress"),
            remote_port: value
                .pointer("/connection/remotePort")
                .and_then(Value::as_u64)
                .and_then(|p| u16::try_from(p).ok()),
            info_remote_address: text_at(value, "/info/remoteAddress"),
        }
    }

    /// Reduced form attached to records as `req`, before redaction.
    pub(crate) fn serialized(&self) -> Value {
        serde_json::to_value(SerializedRequest {
            method: self.method.as_deref(),
            url: self.url.as_deref(),
            headers: &self.headers,
            body: self.body.as_ref(),
            remote_address: self.remote_address.as_deref(),
            remote_port: self.remote_port,
        })
        .unwrap_or_default()
    }
}

/// Outgoing response as seen by the logger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status_code: Option<u16>,
    pub status_message: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl HttpResponse {
    pub fn new(status_code: u16) -> Self {
        HttpResponse {
            status_code: Some(status_code),
            ..Default::default()
        }
    }

    pub fn with_status_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Extract a response from a loosely shaped object.
    ///
    /// Recognized fields: `statusCode`, `statusMessage`, `_headers`/`headers`
    /// and `locals.body`/`source`.
    pub fn from_value(value: &Value) -> Self {
        let headers = match headers_at(value, "/_headers") {
            h if h.is_empty() => headers_at(value, "/headers"),
            h => h,
        };

        HttpResponse {
            status_code: value
                .pointer("/statusCode")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok()),
            status_message: text_at(value, "/statusMessage"),
            headers,
            body: present_at(value, "/locals/body").or_else(|| present_at(value, "/source")),
        }
    }

    /// Reduced form attached to records as `res`, before redaction.
    pub(crate) fn serialized(&self) -> Value {
        serde_json::to_value(SerializedResponse {
            status_code: self.status_code,
            status_message: self.status_message.as_deref(),
            headers: &self.headers,
            body: self.body.as_ref(),
        })
        .unwrap_or_default()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SerializedRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    headers: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_port: Option<u16>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SerializedResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_message: Option<&'a str>,
    headers: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a Value>,
}

fn text_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

fn present_at(value: &Value, pointer: &str) -> Option<Value> {
    value.pointer(pointer).filter(|v| !v.is_null()).cloned()
}

fn headers_at(value: &Value, pointer: &str) -> BTreeMap<String, String> {
    match value.pointer(pointer) {
        Some(Value::Object(map)) => header_map(map),
        _ => BTreeMap::new(),
    }
}

fn header_map(map: &Map<String, Value>) -> BTreeMap<String, String> {
    map.iter()
        .filter_map(|(name, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                Value::Array(items) => items
                    .iter()
                    .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                    .collect::<Vec<_>>()
                    .join(", "),
                Value::Null => return None,
                other => other.to_string(),
            };
            Some((name.to_ascii_lowercase(), text))
        })
        .collect()
}
