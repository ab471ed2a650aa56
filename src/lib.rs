pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod formatter;
pub mod http;
pub mod layer;
pub mod logger;
pub mod record;
pub mod redact;
pub mod report;
pub mod sink;

#[cfg(feature = "cloud")]
pub mod cloud;

pub mod init;
pub mod memory_sink;
pub mod noop_sink;
pub mod stdout_sink;

pub use config::LoggerConfig;
pub use error::ConfigError;
pub use formatter::{LogArgs, LogPayload};
pub use http::{HttpRequest, HttpResponse};
pub use logger::{Logger, LoggerBuilder};
pub use record::{LogRecord, Severity};
pub use redact::{RedactionAction, Redactor, SensitiveFieldSpec, MASK};
pub use report::ErrorReport;
