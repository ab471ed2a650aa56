use crate::env::{self, env_opt};
use crate::error::ConfigError;
use crate::record::{ServiceContext, Severity, SourceReference};
use crate::redact::SensitiveFieldSpec;

/// Everything a [`Logger`](crate::logger::Logger) needs, consumed once at
/// construction.
///
/// **Fields**
/// - `console_level`: minimum level written to stdout; `None` disables the
///   console sink. Defaults to `error`.
/// - `cloud_level`: minimum level shipped to Cloud Logging; `None` (the
///   default) disables that sink.
/// - `sensitive_fields`: fields redacted from payloads, requests and
///   responses.
/// - `service` / `source`: copied into every record.
/// - `project_id`, `access_token`, `log_name`: passed through to the cloud
///   sink.
/// - `channel_buffer`: capacity of each sink's queue before records are
///   dropped.
#[derive(Clone, Debug)]
pub struct LoggerConfig {
    pub console_level: Option<Severity>,
    pub cloud_level: Option<Severity>,
    pub sensitive_fields: SensitiveFieldSpec,
    pub service: ServiceContext,
    pub source: SourceReference,
    pub project_id: Option<String>,
    pub access_token: Option<String>,
    pub log_name: Option<String>,
    pub channel_buffer: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console_level: Some(Severity::Error),
            cloud_level: None,
            sensitive_fields: SensitiveFieldSpec::default(),
            service: ServiceContext::default(),
            source: SourceReference::default(),
            project_id: None,
            access_token: None,
            log_name: None,
            channel_buffer: 1024,
        }
    }
}

impl LoggerConfig {
    pub fn new(service: ServiceContext) -> Self {
        Self {
            service,
            ..Self::default()
        }
    }

    pub fn with_sensitive_fields(mut self, spec: SensitiveFieldSpec) -> Self {
        self.sensitive_fields = spec;
        self
    }

    pub fn with_console_level(mut self, level: Option<Severity>) -> Self {
        self.console_level = level;
        self
    }

    pub fn with_cloud_level(mut self, level: Option<Severity>) -> Self {
        self.cloud_level = level;
        self
    }

    pub fn with_source(mut self, source: SourceReference) -> Self {
        self.source = source;
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Log name used by the cloud sink: the configured one, else the
    /// service name.
    pub fn effective_log_name(&self) -> String {
        self.log_name
            .clone()
            .unwrap_or_else(|| self.service.service.clone())
    }

    /// Build a configuration from the variables listed in [`crate::env`].
    ///
    /// Unset variables keep their defaults. Malformed levels or sensitive
    /// field specs are configuration errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(level) = env_opt(env::LOG_CONSOLE_LEVEL_ENV) {
            config.console_level = parse_level(&level)?;
        }
        if let Some(level) = env_opt(env::LOG_CLOUD_LEVEL_ENV) {
            config.cloud_level = parse_level(&level)?;
        }
        if let Some(spec) = env_opt(env::LOG_SENSITIVE_FIELDS_ENV) {
            config.sensitive_fields = SensitiveFieldSpec::from_json_str(&spec)?;
        }

        config.service = ServiceContext {
            environment: env::env_or(env::LOG_ENVIRONMENT_ENV, "development"),
            service: env::env_or(env::LOG_APPLICATION_NAME_ENV, "app"),
            version: env::env_or(env::LOG_VERSION_ENV, "0.0.0"),
        };
        config.source = SourceReference {
            repository: env_opt(env::LOG_REPOSITORY_ENV),
            revision_id: env_opt(env::LOG_REVISION_ID_ENV),
        };
        config.project_id = env_opt(env::LOG_PROJECT_ID_ENV);
        config.access_token = env_opt(env::LOG_ACCESS_TOKEN_ENV);
        config.log_name = env_opt(env::LOG_NAME_ENV);

        Ok(config)
    }
}

/// Parse a sink level where `none`/`off`/`null` disables the sink.
pub fn parse_level(raw: &str) -> Result<Option<Severity>, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "none" | "off" | "null" => Ok(None),
        other => other.parse().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_log_errors_to_console_only() {
        let config = LoggerConfig::default();
        assert_eq!(config.console_level, Some(Severity::Error));
        assert_eq!(config.cloud_level, None);
        assert!(config.sensitive_fields.is_empty());
    }

    #[test]
    fn level_parsing() {
        assert_eq!(parse_level("OFF").unwrap(), None);
        assert_eq!(parse_level("null").unwrap(), None);
        assert_eq!(parse_level("info").unwrap(), Some(Severity::Info));
        assert!(matches!(parse_level("verbose"), Err(ConfigError::InvalidLevel(_))));
    }

    #[test]
    fn log_name_falls_back_to_service() {
        let mut config = LoggerConfig::new(ServiceContext {
            environment: "prod".into(),
            service: "orders".into(),
            version: "1".into(),
        });
        assert_eq!(config.effective_log_name(), "orders");
        config.log_name = Some("custom".into());
        assert_eq!(config.effective_log_name(), "custom");
    }
}
