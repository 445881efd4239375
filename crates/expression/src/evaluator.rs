//! The evaluator capability and its default implementation.

use serde_json::Value;

use crate::context::EvaluationContext;

/// Capability for resolving template strings against a per-step context.
///
/// The engine never interprets templates itself: it calls this trait for
/// every string leaf in a node's params. Implementations must be pure
/// (no side effects) and total: a path that does not resolve yields
/// `Value::Null`, never an error.
pub trait Evaluator: Send + Sync {
    /// Resolve `template` against `context`, producing a plain value.
    fn evaluate(&self, template: &str, context: &EvaluationContext) -> Value;
}

/// One parsed chunk of a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    /// Literal text copied through verbatim.
    Text(String),
    /// A `{{ ... }}` expression (content without the braces, trimmed).
    Expression(String),
}

/// The default `{{ dotted.path }}` evaluator.
///
/// Semantics:
///
/// - A string that is exactly one expression (`"{{ input.user }}"`) returns
///   the raw looked-up value, preserving its JSON type.
/// - A mixed string (`"Hello {{ input.name }}!"`) interpolates: strings are
///   inserted as-is, `null` and missing paths as the empty string, and other
///   values in their compact JSON form.
/// - Text without `{{` passes through unchanged.
/// - An unterminated `{{` is treated as literal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEvaluator;

impl TemplateEvaluator {
    /// Create the default evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn parse(template: &str) -> Vec<TemplatePart> {
        let mut parts = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            let Some(close) = rest[open + 2..].find("}}") else {
                // Unterminated expression: keep the remainder as text.
                break;
            };
            if open > 0 {
                parts.push(TemplatePart::Text(rest[..open].to_string()));
            }
            let content = rest[open + 2..open + 2 + close].trim().to_string();
            parts.push(TemplatePart::Expression(content));
            rest = &rest[open + 2 + close + 2..];
        }

        if !rest.is_empty() {
            parts.push(TemplatePart::Text(rest.to_string()));
        }
        parts
    }

    fn interpolate(value: Option<&Value>) -> String {
        match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

impl Evaluator for TemplateEvaluator {
    fn evaluate(&self, template: &str, context: &EvaluationContext) -> Value {
        let parts = Self::parse(template);

        // Whole-string expression: return the raw value, keeping its type.
        if let [TemplatePart::Expression(path)] = parts.as_slice() {
            return context.lookup(path).cloned().unwrap_or(Value::Null);
        }

        // No expressions at all: pass the string through untouched.
        if !parts
            .iter()
            .any(|p| matches!(p, TemplatePart::Expression(_)))
        {
            return Value::String(template.to_string());
        }

        let mut result = String::with_capacity(template.len());
        for part in &parts {
            match part {
                TemplatePart::Text(text) => result.push_str(text),
                TemplatePart::Expression(path) => {
                    result.push_str(&Self::interpolate(context.lookup(path)));
                }
            }
        }
        Value::String(result)
    }
}
