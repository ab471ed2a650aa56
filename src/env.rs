//! Environment variable names read by [`LoggerConfig::from_env`].
//!
//! These are purely helpers; the logger itself only ever sees a
//! [`LoggerConfig`] value.
//!
//! [`LoggerConfig`]: crate::config::LoggerConfig
//! [`LoggerConfig::from_env`]: crate::config::LoggerConfig::from_env

/// Minimum level written to stdout. `none` disables the console sink.
pub const LOG_CONSOLE_LEVEL_ENV: &str = "LOG_CONSOLE_LEVEL";

/// Minimum level shipped to Cloud Logging. Unset or `none` disables it.
pub const LOG_CLOUD_LEVEL_ENV: &str = "LOG_CLOUD_LEVEL";

/// JSON object describing the fields to redact, e.g.
/// `{"user":{"ssn":true},"password":true}`.
pub const LOG_SENSITIVE_FIELDS_ENV: &str = "LOG_SENSITIVE_FIELDS";

/// Cloud project receiving the log entries.
pub const LOG_PROJECT_ID_ENV: &str = "LOG_PROJECT_ID";

/// OAuth access token forwarded as a bearer token by the cloud sink.
pub const LOG_ACCESS_TOKEN_ENV: &str = "LOG_ACCESS_TOKEN";

/// Cloud Logging log name.
pub const LOG_NAME_ENV: &str = "LOG_NAME";

/// Deployment environment, e.g. `production`.
pub const LOG_ENVIRONMENT_ENV: &str = "LOG_ENVIRONMENT";

/// Application (service) name.
pub const LOG_APPLICATION_NAME_ENV: &str = "LOG_APPLICATION_NAME";

/// Application version.
pub const LOG_VERSION_ENV: &str = "LOG_VERSION";

/// Source repository URL.
pub const LOG_REPOSITORY_ENV: &str = "LOG_REPOSITORY";

/// Source revision (commit) id.
pub const LOG_REVISION_ID_ENV: &str = "LOG_REVISION_ID";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating unset and blank values alike.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
