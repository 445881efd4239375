//! Engine errors and the workflow-failure code constructors.

use pulsar_core::ErrorData;
use pulsar_execution::StateError;
use thiserror::Error;

/// Host-protocol errors raised by the engine entry points.
///
/// Node and workflow *failures* are not errors at this level; they land as
/// [`ErrorData`] on the execution, which comes back `Ok` with status
/// `failed`. An `Err` here means the caller drove the engine wrong.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `resume` was called on an execution that is not suspended.
    #[error("execution is not suspended")]
    NotSuspended,

    /// The node the execution is suspended on no longer exists in the
    /// compiled graph (definition drift between suspend and resume).
    #[error("suspended node `{0}` is not part of the compiled graph")]
    SuspendedNodeMissing(String),

    /// The selector produced a node the graph does not contain.
    #[error("selected node `{0}` is not part of the compiled graph")]
    UnknownNode(String),

    /// A state operation rejected the requested transition.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Constructors for the structured failure codes stored on records and
/// executions.
pub(crate) mod codes {
    use super::ErrorData;
    use serde_json::json;

    /// The registry has no action for the node's `type` string.
    pub fn action_not_found(node_key: &str, kind: &str) -> ErrorData {
        ErrorData::new(
            "action_not_found",
            format!("no action registered for type `{kind}`"),
        )
        .with_details(json!({"node_key": node_key, "type": kind}))
    }

    /// The action panicked while executing.
    pub fn action_execution_failed(detail: String) -> ErrorData {
        ErrorData::new("action_execution_failed", "action raised during execution")
            .with_details(json!({"panic": detail}))
    }

    /// The action routed to a port it never declared.
    pub fn invalid_output_port(node_key: &str, port: &str, declared: &[String]) -> ErrorData {
        ErrorData::new(
            "invalid_output_port",
            format!("action returned undeclared output port `{port}`"),
        )
        .with_details(json!({"node_key": node_key, "port": port, "declared": declared}))
    }

    /// Expanded params did not satisfy the action's schema.
    pub fn params_validation_failed(details: serde_json::Value) -> ErrorData {
        ErrorData::new("workflow_error", "Action parameters validation failed")
            .with_details(details)
    }

    /// `Action::prepare` failed before the first step.
    pub fn action_preparation_failed(node_key: &str, inner: ErrorData) -> ErrorData {
        ErrorData::new(
            "action_preparation_failed",
            format!("preparation failed for node `{node_key}`"),
        )
        .with_details(json!({"node_key": node_key, "error": inner.to_value()}))
    }

    /// The structural loop-protection ceiling was hit.
    pub fn infinite_loop_protection(iterations: u32, max_iterations: u32) -> ErrorData {
        ErrorData::new(
            "infinite_loop_protection",
            format!("iteration count reached the limit of {max_iterations}"),
        )
        .with_details(json!({"iterations": iterations, "max_iterations": max_iterations}))
    }

    /// Wrap the original error once retries are exhausted and the node
    /// stops the workflow.
    pub fn retries_exhausted(original: ErrorData) -> ErrorData {
        ErrorData::new("action.execution_error", "action failed after retries")
            .with_details(original.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display() {
        assert_eq!(
            EngineError::NotSuspended.to_string(),
            "execution is not suspended"
        );
        assert!(
            EngineError::SuspendedNodeMissing("w".into())
                .to_string()
                .contains("`w`")
        );
    }

    #[test]
    fn state_error_passthrough() {
        let err = EngineError::from(StateError::NotSuspended);
        assert_eq!(err.to_string(), "execution is not suspended");
    }

    #[test]
    fn code_constructors() {
        let err = codes::action_not_found("fetch", "http.request");
        assert_eq!(err.code, "action_not_found");
        assert_eq!(err.details.as_ref().unwrap()["type"], "http.request");

        let err = codes::params_validation_failed(serde_json::json!({"errors": []}));
        assert_eq!(err.code, "workflow_error");
        assert_eq!(err.message, "Action parameters validation failed");

        let err = codes::infinite_loop_protection(5, 5);
        assert_eq!(err.code, "infinite_loop_protection");

        let wrapped = codes::retries_exhausted(ErrorData::new("action_error", "boom"));
        assert_eq!(wrapped.code, "action.execution_error");
        assert_eq!(wrapped.details.as_ref().unwrap()["code"], "action_error");
    }
}
