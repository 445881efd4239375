//! Per-step evaluation context.

use serde_json::Value;

/// The data a template is evaluated against.
///
/// Built fresh for every node dispatch from the routed input, the runtime
/// node-output cache, workflow variables, host environment, and workflow /
/// execution identity. The context owns a single JSON root whose top-level
/// keys are `input`, `nodes`, `vars`, `env`, `workflow`, `execution`.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    root: Value,
}

impl EvaluationContext {
    /// Create a context from a JSON root object.
    #[must_use]
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// The full context root.
    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Resolve a dotted path (`"input.user.id"`, `"nodes.fetch.output.0"`)
    /// against the context root.
    ///
    /// A leading `$` is accepted and ignored (`"$input.x"` ≡ `"input.x"`).
    /// Numeric segments index into arrays. Returns `None` for any segment
    /// that does not resolve; callers map that to `null`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let path = path.trim().trim_start_matches('$');
        if path.is_empty() {
            return None;
        }

        let mut current = &self.root;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => {
                    let index: usize = segment.parse().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }
}
