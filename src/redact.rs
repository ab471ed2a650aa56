//! Path-based redaction of sensitive fields inside dynamically shaped values.
//!
//! A [`SensitiveFieldSpec`] is a nested description of the fields to hide.
//! It is flattened once into [`RedactionRule`]s by [`Redactor::new`]; after
//! that, redacting a [`Value`] is a walk over each rule's path that silently
//! skips anything the value does not contain.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ConfigError;

/// Replacement written over every field matched by a [`RedactionAction::Mask`] rule.
pub const MASK: &str = "****";

/// Custom replacement function. Receives the current value at the matched
/// path and returns what should be stored there instead.
///
/// Transforms are expected to be pure and deterministic; they run on every
/// record that contains the path, including records that were already
/// redacted once.
pub type TransformFn = dyn Fn(&Value) -> Value + Send + Sync;

/// What to do with a value once its path has been resolved.
#[derive(Clone)]
pub enum RedactionAction {
    Mask,
    Transform(Arc<TransformFn>),
}

impl RedactionAction {
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        RedactionAction::Transform(Arc::new(f))
    }

    fn apply(&self, current: &Value) -> Value {
        match self {
            RedactionAction::Mask => Value::String(MASK.to_string()),
            RedactionAction::Transform(f) => f(current),
        }
    }
}

impl fmt::Debug for RedactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedactionAction::Mask => f.write_str("Mask"),
            RedactionAction::Transform(_) => f.write_str("Transform(<fn>)"),
        }
    }
}

#[derive(Clone, Debug)]
enum SpecNode {
    Leaf(RedactionAction),
    Nested(SensitiveFieldSpec),
}

/// Declarative, nested description of the fields to redact.
///
/// Keys may themselves contain dots: `mask("user.ssn")` and
/// `nested("user", SensitiveFieldSpec::new().mask("ssn"))` describe the
/// same path.
#[derive(Clone, Debug, Default)]
pub struct SensitiveFieldSpec {
    fields: BTreeMap<String, SpecNode>,
}

impl SensitiveFieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value at `key` with [`MASK`].
    pub fn mask(mut self, key: impl Into<String>) -> Self {
        self.fields.insert(key.into(), SpecNode::Leaf(RedactionAction::Mask));
        self
    }

    /// Replace the value at `key` with the output of `f`.
    pub fn transform<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.fields
            .insert(key.into(), SpecNode::Leaf(RedactionAction::transform(f)));
        self
    }

    /// Apply `spec` to the object found at `key`.
    pub fn nested(mut self, key: impl Into<String>, spec: SensitiveFieldSpec) -> Self {
        self.fields.insert(key.into(), SpecNode::Nested(spec));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a spec from its JSON form.
    ///
    /// `true` masks the field, `false` leaves it alone, an object nests and
    /// `null` at the top level is an empty spec. Any other leaf is a
    /// configuration error.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(_) => Self::from_json_at(value, ""),
            _ => Err(ConfigError::InvalidSpecLeaf { path: "<root>".to_string() }),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_json(&value)
    }

    fn from_json_at(value: &Value, prefix: &str) -> Result<Self, ConfigError> {
        let mut spec = Self::default();
        if let Value::Object(map) = value {
            for (key, node) in map {
                let path = join_path(prefix, key);
                match node {
                    Value::Bool(true) => spec = spec.mask(key.clone()),
                    Value::Bool(false) => {}
                    Value::Object(_) => {
                        let inner = Self::from_json_at(node, &path)?;
                        spec = spec.nested(key.clone(), inner);
                    }
                    _ => return Err(ConfigError::InvalidSpecLeaf { path }),
                }
            }
        }
        Ok(spec)
    }

    /// Normalize the nested spec into one rule per leaf.
    pub fn flatten(&self) -> Result<Vec<RedactionRule>, ConfigError> {
        let mut rules = Vec::new();
        self.flatten_into(&[], &mut rules)?;
        Ok(rules)
    }

    fn flatten_into(&self, prefix: &[String], out: &mut Vec<RedactionRule>) -> Result<(), ConfigError> {
        for (key, node) in &self.fields {
            let mut segments = prefix.to_vec();
            segments.extend(key.split('.').map(str::to_string));
            if segments.iter().any(|s| s.is_empty()) {
                return Err(ConfigError::EmptyPathSegment { path: segments.join(".") });
            }

            match node {
                SpecNode::Leaf(action) => out.push(RedactionRule {
                    path: FieldPath(segments),
                    action: action.clone(),
                }),
                SpecNode::Nested(inner) => inner.flatten_into(&segments, out)?,
            }
        }
        Ok(())
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// A path into a structured value. Segments address object keys, or array
/// indices when they parse as one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// One flattened `(path, action)` pair.
#[derive(Clone, Debug)]
pub struct RedactionRule {
    pub path: FieldPath,
    pub action: RedactionAction,
}

/// Per-call outcome of [`Redactor::redact_in_place`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedactionStats {
    /// Rules whose path resolved and whose replacement was written.
    pub applied: usize,
    /// Rules whose path does not exist in the target.
    pub skipped: usize,
    /// Rules that resolved but failed while computing the replacement; the
    /// original value was kept.
    pub failed: usize,
}

/// Applies a flattened [`SensitiveFieldSpec`] to arbitrary values.
///
/// Shared read-only between all log calls; the only interior mutability is
/// the fail-open counter.
#[derive(Debug, Default)]
pub struct Redactor {
    rules: Vec<RedactionRule>,
    fail_open: AtomicU64,
}

impl Redactor {
    pub fn new(spec: &SensitiveFieldSpec) -> Result<Self, ConfigError> {
        Ok(Self::from_rules(spec.flatten()?))
    }

    pub fn from_rules(rules: Vec<RedactionRule>) -> Self {
        Redactor {
            rules,
            fail_open: AtomicU64::new(0),
        }
    }

    pub fn rules(&self) -> &[RedactionRule] {
        &self.rules
    }

    /// Dotted form of every configured path.
    pub fn paths(&self) -> impl Iterator<Item = String> + '_ {
        self.rules.iter().map(|r| r.path.to_string())
    }

    /// Number of times a matched field was left unredacted because its
    /// replacement could not be computed.
    pub fn fail_open_count(&self) -> u64 {
        self.fail_open.load(Ordering::Relaxed)
    }

    /// Redact `target` and hand it back.
    pub fn redact(&self, mut target: Value) -> Value {
        self.redact_in_place(&mut target);
        target
    }

    /// Overwrite every configured path present in `target`.
    ///
    /// Never panics: unresolvable paths are skipped and a panicking
    /// transform leaves its field untouched (fail open) while the remaining
    /// rules still run.
    pub fn redact_in_place(&self, target: &mut Value) -> RedactionStats {
        let mut stats = RedactionStats::default();
        if target.is_null() {
            stats.skipped = self.rules.len();
            return stats;
        }

        for rule in &self.rules {
            let Some(current) = resolve_mut(target, rule.path.segments()) else {
                stats.skipped += 1;
                continue;
            };

            match catch_unwind(AssertUnwindSafe(|| rule.action.apply(current))) {
                Ok(replacement) => {
                    *current = replacement;
                    stats.applied += 1;
                }
                Err(_) => {
                    self.fail_open.fetch_add(1, Ordering::Relaxed);
                    stats.failed += 1;
                    tracing::warn!(
                        target: "redacted_log_sink",
                        path = %rule.path,
                        "redaction transform panicked, field left unredacted"
                    );
                }
            }
        }
        stats
    }
}

/// One-shot redaction with a spec that has not been validated yet.
///
/// A spec that cannot be flattened leaves `target` untouched and emits a
/// diagnostic instead of failing the caller.
pub fn redact(spec: &SensitiveFieldSpec, target: Value) -> Value {
    match Redactor::new(spec) {
        Ok(redactor) => redactor.redact(target),
        Err(e) => {
            tracing::warn!(target: "redacted_log_sink", error = %e, "invalid sensitive field spec, value left unredacted");
            target
        }
    }
}

fn resolve_mut<'v>(target: &'v mut Value, segments: &[String]) -> Option<&'v mut Value> {
    let mut node = target;
    for segment in segments {
        node = match node {
            Value::Object(map) => map.get_mut(segment.as_str())?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}
