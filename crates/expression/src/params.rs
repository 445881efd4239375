//! Parameter-tree expansion.

use serde_json::Value;

use crate::context::EvaluationContext;
use crate::evaluator::Evaluator;

/// Expand every string leaf of a params tree through the evaluator.
///
/// Objects and arrays are walked recursively; string leaves are evaluated
/// (so `"{{ input.user.id }}"` becomes the routed value, preserving its
/// type); numbers, booleans, and nulls pass through untouched.
#[must_use]
pub fn render_params(params: &Value, evaluator: &dyn Evaluator, context: &EvaluationContext) -> Value {
    match params {
        Value::String(template) => evaluator.evaluate(template, context),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_params(v, evaluator, context)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| render_params(v, evaluator, context))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::TemplateEvaluator;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(json!({
            "input": {"id": 42, "name": "ada"},
            "vars": {"region": "eu"}
        }))
    }

    #[test]
    fn expands_nested_string_leaves() {
        let params = json!({
            "url": "https://{{ vars.region }}.example.com/users/{{ input.id }}",
            "body": {"user_id": "{{ input.id }}"},
            "tags": ["{{ input.name }}", "static"]
        });
        let rendered = render_params(&params, &TemplateEvaluator::new(), &ctx());
        assert_eq!(
            rendered,
            json!({
                "url": "https://eu.example.com/users/42",
                "body": {"user_id": 42},
                "tags": ["ada", "static"]
            })
        );
    }

    #[test]
    fn non_string_leaves_pass_through() {
        let params = json!({"retries": 3, "enabled": true, "note": null});
        let rendered = render_params(&params, &TemplateEvaluator::new(), &ctx());
        assert_eq!(rendered, params);
    }

    #[test]
    fn missing_paths_become_null() {
        let params = json!({"value": "{{ input.absent }}"});
        let rendered = render_params(&params, &TemplateEvaluator::new(), &ctx());
        assert_eq!(rendered, json!({"value": null}));
    }

    #[test]
    fn empty_object_stays_empty() {
        let rendered = render_params(&json!({}), &TemplateEvaluator::new(), &ctx());
        assert_eq!(rendered, json!({}));
    }
}
