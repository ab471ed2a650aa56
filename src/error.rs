/// Error type returned while building a logger from configuration.
///
/// These are the only failures the crate surfaces to callers: once a
/// [`Logger`](crate::logger::Logger) exists, log calls never fail.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown log level: {0:?}")]
    InvalidLevel(String),

    #[error("sensitive field spec at `{path}` must be a boolean or an object")]
    InvalidSpecLeaf { path: String },

    #[error("sensitive field path `{path}` contains an empty segment")]
    EmptyPathSegment { path: String },

    #[error("sensitive field spec is not valid JSON: {0}")]
    InvalidSpecJson(#[from] serde_json::Error),

    #[error("cloud logging sink is enabled but no project id was configured")]
    MissingProjectId,

    #[error("cloud feature is not enabled")]
    CloudFeatureDisabled,

    #[cfg(feature = "cloud")]
    #[error("failed to build cloud logging client: {0}")]
    CloudClient(#[from] reqwest::Error),

    #[error("sinks must be created from within a Tokio runtime")]
    NoRuntime,

    #[error("a global tracing subscriber is already installed")]
    SubscriberInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}
