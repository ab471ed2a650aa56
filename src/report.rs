use serde::Serialize;
use serde_json::Value;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

/// Serialized view of an error passed to `error`/`fatal` calls.
///
/// Captures the display message and the `source()` chain up front so the
/// record can be built without holding on to the original error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Marks an error that was already logged elsewhere.
    #[serde(skip)]
    pub skip_log: bool,
}

impl ErrorReport {
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        ErrorReport {
            name: None,
            message: err.to_string(),
            causes,
            stack: None,
            details: None,
            skip_log: false,
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        ErrorReport {
            name: None,
            message: message.into(),
            causes: Vec::new(),
            stack: None,
            details: None,
            skip_log: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a stack trace. The stored stack starts with the message line,
    /// followed by the frames. Backtraces that were not captured are ignored.
    pub fn with_backtrace(mut self, backtrace: &Backtrace) -> Self {
        if backtrace.status() == BacktraceStatus::Captured {
            self.stack = Some(format!("{}\n{}", self.message, backtrace));
        }
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_skip_log(mut self, skip_log: bool) -> Self {
        self.skip_log = skip_log;
        self
    }

    /// Text used as the record `message`: the stack when one is known,
    /// otherwise the error's string form.
    pub fn record_message(&self) -> String {
        match &self.stack {
            Some(stack) => stack.clone(),
            None => self.to_string(),
        }
    }

    pub(crate) fn serialized(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::String(self.to_string()))
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// `type_name` with the outer type's module path removed, e.g. `QueryError`.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let end = full.find('<').unwrap_or(full.len());
    match full[..end].rfind("::") {
        Some(i) => &full[i + 2..],
        None => full,
    }
}

/// Named after the error's type, so the record message reads
/// `QueryError: query failed`.
impl<E> From<&E> for ErrorReport
where
    E: Error + 'static,
{
    fn from(err: &E) -> Self {
        ErrorReport::from_error(err).with_name(short_type_name::<E>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("query failed")]
    struct QueryError {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn short_type_name_drops_module_path() {
        assert_eq!(short_type_name::<QueryError>(), "QueryError");
        assert_eq!(short_type_name::<u8>(), "u8");
    }

    #[test]
    fn collects_source_chain() {
        let err = QueryError {
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out"),
        };
        let report = ErrorReport::from(&err);
        assert_eq!(report.message, "query failed");
        assert_eq!(report.causes, vec!["socket timed out".to_string()]);
        assert_eq!(report.name.as_deref(), Some("QueryError"));
        assert_eq!(report.record_message(), "QueryError: query failed");
    }

    #[test]
    fn stack_wins_over_message() {
        let report = ErrorReport::from_message("boom")
            .with_name("TypeError")
            .with_stack("TypeError: boom\n    at handler");
        assert_eq!(report.record_message(), "TypeError: boom\n    at handler");
        assert_eq!(ErrorReport::from_message("boom").with_name("TypeError").record_message(), "TypeError: boom");
    }

    #[test]
    fn disabled_backtrace_is_ignored() {
        let report = ErrorReport::from_message("x").with_backtrace(&Backtrace::disabled());
        assert_eq!(report.stack, None);
    }

    #[test]
    fn serialized_omits_empty_parts_and_skip_flag() {
        let report = ErrorReport::from_message("x").with_skip_log(true).with_details(json!({"code": 7}));
        assert_eq!(report.serialized(), json!({"message": "x", "details": {"code": 7}}));
    }
}
