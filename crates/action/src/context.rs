//! The per-step view handed to every action invocation.

use pulsar_core::{ExecutionId, WorkflowId};
use serde_json::{Value, json};

/// Identity of the workflow being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowRef {
    /// The workflow definition id.
    pub id: WorkflowId,
    /// The definition version the execution graph was compiled from.
    pub version: u64,
}

/// Identity and shared state of the current execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRef {
    /// The execution id.
    pub id: ExecutionId,
    /// The shared workflow context (accumulated `context_updates`).
    pub state: Value,
}

/// Everything an action can see during one invocation.
///
/// Built fresh for every dispatch; also serves as the root the expression
/// evaluator resolves templates against (same six top-level keys).
#[derive(Debug, Clone, PartialEq)]
pub struct ActionContext {
    /// Routed input, keyed by input port (`{"input": {...}}`).
    pub input: Value,
    /// Completed node outputs, keyed by node key
    /// (`{"fetch": {"output": {...}, "context": {...}}}`).
    pub nodes: Value,
    /// Read-only workflow variables.
    pub vars: Value,
    /// Host environment data.
    pub env: Value,
    /// Workflow identity.
    pub workflow: WorkflowRef,
    /// Execution identity and shared state.
    pub execution: ExecutionRef,
}

impl ActionContext {
    /// The JSON root used for template evaluation:
    /// `{input, nodes, vars, env, workflow, execution}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "input": self.input,
            "nodes": self.nodes,
            "vars": self.vars,
            "env": self.env,
            "workflow": {
                "id": self.workflow.id.to_string(),
                "version": self.workflow.version,
            },
            "execution": {
                "id": self.execution.id.to_string(),
                "state": self.execution.state,
            },
        })
    }

    /// The routed value at one input port, if present.
    #[must_use]
    pub fn input_port(&self, port: &str) -> Option<&Value> {
        self.input.get(port)
    }
}
