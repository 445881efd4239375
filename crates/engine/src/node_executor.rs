//! Single-node execution lifecycle.

use std::sync::Arc;

use futures::FutureExt;
use pulsar_action::{ActionContext, ActionRegistry, ActionResult, SuspensionType};
use pulsar_action::context::{ExecutionRef, WorkflowRef};
use pulsar_action::definition::ActionDefinition;
use pulsar_core::{ErrorData, PortKey};
use pulsar_execution::{NodeExecution, WorkflowExecution};
use pulsar_expression::{EvaluationContext, Evaluator, render_params};
use pulsar_workflow::{ExecutionGraph, Node, OnErrorPolicy};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::codes;
use crate::retry::{build_retry_suspension, should_retry};

/// Port used by the `continue_error_output` policy. Virtual: it bypasses
/// the declared-port check.
const ERROR_PORT: &str = "error";

/// Indices and attempt counter for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunAttempt {
    /// The execution index this record will take.
    pub execution_index: u64,
    /// The per-node run index (reused by retries, bumped by re-entries).
    pub run_index: u64,
    /// 0 for the initial run; the retry suspension's `attempt_number` after.
    pub attempt_number: u32,
}

/// Outcome of dispatching one node, carrying the finished audit record.
#[derive(Debug)]
pub enum NodeRun {
    /// The node completed (possibly synthesized by an on-error policy).
    Completed {
        /// The completed record.
        record: NodeExecution,
        /// Workflow-context updates requested by the action.
        context_updates: Option<serde_json::Map<String, Value>>,
    },
    /// The node suspended (external wait or internal retry delay).
    Suspended {
        /// The suspended record.
        record: NodeExecution,
    },
    /// The node failed fatally; the workflow must fail.
    Failed {
        /// The failed record.
        record: NodeExecution,
        /// The error to store on the execution.
        error: ErrorData,
    },
}

/// Executes a single selected node: template-expands params, validates them,
/// invokes the action behind a panic fence, classifies the result, and
/// applies the retry and on-error policies.
pub struct NodeExecutor {
    registry: Arc<ActionRegistry>,
    evaluator: Arc<dyn Evaluator>,
}

impl NodeExecutor {
    /// Create a node executor over a registry and an expression evaluator.
    #[must_use]
    pub fn new(registry: Arc<ActionRegistry>, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            registry,
            evaluator,
        }
    }

    /// Run one node to a finished record.
    pub async fn execute(
        &self,
        graph: &ExecutionGraph,
        node: &Node,
        execution: &WorkflowExecution,
        routed_input: serde_json::Map<String, Value>,
        attempt: RunAttempt,
    ) -> NodeRun {
        let mut record =
            NodeExecution::start(&node.key, attempt.execution_index, attempt.run_index);

        let Some(action) = self.registry.get(&node.kind) else {
            let error = codes::action_not_found(&node.key, &node.kind);
            record.fail(error.clone());
            return NodeRun::Failed { record, error };
        };
        let action = Arc::clone(action);
        let definition = action.definition().clone();

        let context = build_context(graph, execution, routed_input);
        let params = self.expand_params(node, &context);
        record.params = params.clone();

        if let Err(details) = validate_params(&definition, &params) {
            let error = codes::params_validation_failed(details);
            // Schema failures are never retried; the on-error policy still
            // applies.
            return handle_failure(record, node, &definition, attempt, error, None, false);
        }

        debug!(node_key = %node.key, kind = %node.kind, run_index = attempt.run_index,
               attempt = attempt.attempt_number, "dispatching node");
        let result = invoke(|| action.execute(params, &context)).await;
        classify(record, node, &definition, attempt, result)
    }

    /// Resume a node suspended on a non-retry suspension type.
    ///
    /// Params and routed input are rebuilt fresh: the stored params may
    /// reference upstream outputs that changed across loop iterations.
    pub async fn resume_suspended(
        &self,
        graph: &ExecutionGraph,
        node: &Node,
        execution: &WorkflowExecution,
        routed_input: serde_json::Map<String, Value>,
        resume_data: Value,
        attempt: RunAttempt,
    ) -> NodeRun {
        let mut record =
            NodeExecution::start(&node.key, attempt.execution_index, attempt.run_index);

        let Some(action) = self.registry.get(&node.kind) else {
            let error = codes::action_not_found(&node.key, &node.kind);
            record.fail(error.clone());
            return NodeRun::Failed { record, error };
        };
        let action = Arc::clone(action);
        let definition = action.definition().clone();

        let context = build_context(graph, execution, routed_input);
        let params = self.expand_params(node, &context);
        record.params = params.clone();

        debug!(node_key = %node.key, kind = %node.kind, "resuming suspended node");
        let result = invoke(|| action.resume(params, &context, resume_data)).await;
        classify(record, node, &definition, attempt, result)
    }

    fn expand_params(&self, node: &Node, context: &ActionContext) -> Value {
        let eval_context = EvaluationContext::new(context.to_value());
        render_params(&node.params, self.evaluator.as_ref(), &eval_context)
    }
}

impl std::fmt::Debug for NodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeExecutor")
            .field("actions", &self.registry.len())
            .finish()
    }
}

/// Invoke an action behind a panic fence.
async fn invoke<F, Fut>(f: F) -> ActionResult
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ActionResult>,
{
    match std::panic::AssertUnwindSafe(f()).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let detail = panic_message(&panic);
            warn!(panic = %detail, "action panicked");
            ActionResult::failure(codes::action_execution_failed(detail))
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "action panicked".to_string()
    }
}

/// Build the per-step action/expression context.
fn build_context(
    graph: &ExecutionGraph,
    execution: &WorkflowExecution,
    routed_input: serde_json::Map<String, Value>,
) -> ActionContext {
    ActionContext {
        input: Value::Object(routed_input),
        nodes: execution.nodes_value(),
        vars: merged_vars(graph, execution),
        env: execution.runtime.env.clone(),
        workflow: WorkflowRef {
            id: graph.workflow_id,
            version: graph.version,
        },
        execution: ExecutionRef {
            id: execution.id,
            state: Value::Object(execution.context_data.workflow.clone()),
        },
    }
}

/// Workflow variables overridden by run-scoped vars.
fn merged_vars(graph: &ExecutionGraph, execution: &WorkflowExecution) -> Value {
    let mut vars = graph.variables().clone();
    if let Value::Object(overrides) = &execution.vars {
        for (key, value) in overrides {
            vars.insert(key.clone(), value.clone());
        }
    }
    Value::Object(vars)
}

/// Validate expanded params against the action's optional JSON Schema.
fn validate_params(definition: &ActionDefinition, params: &Value) -> Result<(), Value> {
    let Some(schema) = &definition.params_schema else {
        return Ok(());
    };
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| json!({"schema_error": e.to_string()}))?;
    if let Err(errors) = compiled.validate(params) {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(json!({"errors": messages}));
    }
    Ok(())
}

/// Turn an action result into a finished record.
fn classify(
    mut record: NodeExecution,
    node: &Node,
    definition: &ActionDefinition,
    attempt: RunAttempt,
    result: ActionResult,
) -> NodeRun {
    match result {
        ActionResult::Success {
            output,
            port,
            context_updates,
        } => {
            let port: PortKey = port.unwrap_or_else(|| definition.first_output_port());
            if !definition.is_valid_output_port(&port) {
                let error =
                    codes::invalid_output_port(&node.key, &port, &definition.output_ports);
                record.fail(error.clone());
                return NodeRun::Failed { record, error };
            }
            record.complete(output, port);
            NodeRun::Completed {
                record,
                context_updates,
            }
        }
        ActionResult::Suspend {
            suspension_type,
            data,
        } => {
            record.suspend(suspension_type, data);
            NodeRun::Suspended { record }
        }
        ActionResult::Failure { error, port } => {
            handle_failure(record, node, definition, attempt, error, port, true)
        }
    }
}

/// Apply the retry policy, then the on-error policy, to a failed attempt.
fn handle_failure(
    mut record: NodeExecution,
    node: &Node,
    definition: &ActionDefinition,
    attempt: RunAttempt,
    error: ErrorData,
    error_port: Option<PortKey>,
    retryable: bool,
) -> NodeRun {
    let settings = &node.settings;

    if retryable && should_retry(settings, attempt.attempt_number) {
        let payload = build_retry_suspension(settings, attempt.attempt_number, error.clone());
        debug!(node_key = %node.key, attempt = payload.attempt_number,
               max = payload.max_attempts, "scheduling retry");
        record.suspend(SuspensionType::Retry, payload.to_value());
        return NodeRun::Suspended { record };
    }

    match settings.on_error {
        OnErrorPolicy::StopWorkflow => {
            let error = if attempt.attempt_number > 0 {
                codes::retries_exhausted(error)
            } else {
                error
            };
            record.fail(error.clone());
            NodeRun::Failed { record, error }
        }
        OnErrorPolicy::Continue => {
            let port = error_port.unwrap_or_else(|| definition.first_output_port());
            // Same declared-port rule as the success path: an undeclared
            // error port must fail fast, not starve downstream nodes.
            if !definition.is_valid_output_port(&port) {
                let error = codes::invalid_output_port(&node.key, &port, &definition.output_ports);
                record.fail(error.clone());
                return NodeRun::Failed { record, error };
            }
            record.complete(error.to_value(), port);
            NodeRun::Completed {
                record,
                context_updates: None,
            }
        }
        OnErrorPolicy::ContinueErrorOutput => {
            record.complete(error.to_value(), ERROR_PORT);
            NodeRun::Completed {
                record,
                context_updates: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use pulsar_action::Action;
    use pulsar_core::WorkflowId;
    use pulsar_execution::{DEFAULT_MAX_ITERATIONS, NodeStatus};
    use pulsar_expression::TemplateEvaluator;
    use pulsar_workflow::{NodeSettings, Workflow, compile};

    struct Scripted {
        definition: ActionDefinition,
        result: fn(Value, &ActionContext) -> ActionResult,
    }

    #[async_trait]
    impl Action for Scripted {
        fn definition(&self) -> &ActionDefinition {
            &self.definition
        }
        async fn execute(&self, params: Value, context: &ActionContext) -> ActionResult {
            (self.result)(params, context)
        }
    }

    struct Panicking(ActionDefinition);

    #[async_trait]
    impl Action for Panicking {
        fn definition(&self) -> &ActionDefinition {
            &self.0
        }
        async fn execute(&self, _params: Value, _context: &ActionContext) -> ActionResult {
            panic!("unexpected input shape")
        }
    }

    fn setup(
        action: Option<Arc<dyn Action>>,
        node_settings: NodeSettings,
        params: Value,
    ) -> (ExecutionGraph, WorkflowExecution, NodeExecutor) {
        let wf = Workflow::new(WorkflowId::nil(), 1, "w")
            .with_node(Node::new("t", "manual.trigger"))
            .with_node(
                Node::new("n", "test.subject")
                    .with_params(params)
                    .with_settings(node_settings),
            )
            .connect("t", "n");
        let graph = compile(&wf, "t").unwrap();

        let mut registry = ActionRegistry::new();
        if let Some(action) = action {
            registry.register(action);
        }
        let executor = NodeExecutor::new(Arc::new(registry), Arc::new(TemplateEvaluator::new()));

        let mut execution = WorkflowExecution::new(&graph, "manual", json!({}), json!({}));
        execution.start(json!({}), DEFAULT_MAX_ITERATIONS).unwrap();
        (graph, execution, executor)
    }

    fn attempt0() -> RunAttempt {
        RunAttempt {
            execution_index: 0,
            run_index: 0,
            attempt_number: 0,
        }
    }

    fn subject(result: fn(Value, &ActionContext) -> ActionResult) -> Arc<dyn Action> {
        Arc::new(Scripted {
            definition: ActionDefinition::action("test.subject", "Subject"),
            result,
        })
    }

    #[tokio::test]
    async fn success_routes_to_first_declared_port() {
        let (graph, execution, executor) = setup(
            Some(subject(|_p, _c| ActionResult::success(json!({"ok": true})))),
            NodeSettings::default(),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Completed { record, .. } => {
                assert_eq!(record.status, NodeStatus::Completed);
                assert_eq!(record.output_port.as_deref(), Some("main"));
                assert_eq!(record.output_data, Some(json!({"ok": true})));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn params_are_expanded_before_invocation() {
        let (graph, execution, executor) = setup(
            Some(subject(|params, _c| ActionResult::success(params))),
            NodeSettings::default(),
            json!({"greeting": "hi {{ input.input.name }}"}),
        );
        let node = graph.node("n").unwrap();
        let mut routed = serde_json::Map::new();
        routed.insert("input".into(), json!({"name": "ada"}));

        let run = executor
            .execute(&graph, node, &execution, routed, attempt0())
            .await;
        match run {
            NodeRun::Completed { record, .. } => {
                assert_eq!(record.params, json!({"greeting": "hi ada"}));
                assert_eq!(record.output_data, Some(json!({"greeting": "hi ada"})));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_action_fails_fatally() {
        let (graph, execution, executor) = setup(None, NodeSettings::default(), json!({}));
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Failed { record, error } => {
                assert_eq!(error.code, "action_not_found");
                assert_eq!(record.status, NodeStatus::Failed);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undeclared_port_fails_fatally_despite_continue_policy() {
        let (graph, execution, executor) = setup(
            Some(subject(|_p, _c| {
                ActionResult::success_with_port(json!(1), "sideways")
            })),
            NodeSettings::default().with_on_error(OnErrorPolicy::Continue),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Failed { error, .. } => assert_eq!(error.code, "invalid_output_port"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wildcard_outputs_accept_any_port() {
        let (graph, execution, executor) = setup(
            Some(Arc::new(Scripted {
                definition: ActionDefinition::action("test.subject", "Subject")
                    .with_wildcard_outputs(),
                result: |_p, _c| ActionResult::success_with_port(json!(1), "case_7"),
            })),
            NodeSettings::default(),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Completed { record, .. } => {
                assert_eq!(record.output_port.as_deref(), Some("case_7"));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn panic_is_fenced_into_failure() {
        let (graph, execution, executor) = setup(
            Some(Arc::new(Panicking(ActionDefinition::action(
                "test.subject",
                "Subject",
            )))),
            NodeSettings::default(),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Failed { error, .. } => {
                assert_eq!(error.code, "action_execution_failed");
                assert_eq!(
                    error.details.as_ref().unwrap()["panic"],
                    "unexpected input shape"
                );
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_with_retry_budget_suspends() {
        let (graph, execution, executor) = setup(
            Some(subject(|_p, _c| {
                ActionResult::failure(ErrorData::new("action_error", "boom"))
            })),
            NodeSettings::default().with_retries(2, 10),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Suspended { record } => {
                assert_eq!(record.suspension_type, Some(SuspensionType::Retry));
                let data = record.suspension_data.unwrap();
                assert_eq!(data["attempt_number"], 1);
                assert_eq!(data["max_attempts"], 2);
                assert_eq!(data["original_error"]["code"], "action_error");
            }
            other => panic!("expected Suspended, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_retries_wrap_error_on_stop() {
        let (graph, execution, executor) = setup(
            Some(subject(|_p, _c| {
                ActionResult::failure(ErrorData::new("action_error", "boom"))
            })),
            NodeSettings::default().with_retries(1, 10),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let attempt = RunAttempt {
            execution_index: 0,
            run_index: 0,
            attempt_number: 1,
        };
        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt)
            .await;
        match run {
            NodeRun::Failed { error, .. } => {
                assert_eq!(error.code, "action.execution_error");
                assert_eq!(error.details.as_ref().unwrap()["code"], "action_error");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn continue_policy_synthesizes_completed_output() {
        let (graph, execution, executor) = setup(
            Some(subject(|_p, _c| {
                ActionResult::failure(ErrorData::new("action_error", "boom"))
            })),
            NodeSettings::default().with_on_error(OnErrorPolicy::Continue),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Completed { record, .. } => {
                assert_eq!(record.status, NodeStatus::Completed);
                assert_eq!(record.output_port.as_deref(), Some("main"));
                assert_eq!(record.output_data.as_ref().unwrap()["code"], "action_error");
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undeclared_failure_port_fails_fatally_under_continue() {
        let (graph, execution, executor) = setup(
            Some(subject(|_p, _c| {
                ActionResult::failure_with_port(
                    ErrorData::new("action_error", "boom"),
                    "sideways",
                )
            })),
            NodeSettings::default().with_on_error(OnErrorPolicy::Continue),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Failed { error, record } => {
                assert_eq!(error.code, "invalid_output_port");
                assert_eq!(record.status, NodeStatus::Failed);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn declared_failure_port_routes_under_continue() {
        let (graph, execution, executor) = setup(
            Some(Arc::new(Scripted {
                definition: ActionDefinition::action("test.subject", "Subject")
                    .with_output_ports(["main", "rejected"]),
                result: |_p, _c| {
                    ActionResult::failure_with_port(
                        ErrorData::new("action_error", "boom"),
                        "rejected",
                    )
                },
            })),
            NodeSettings::default().with_on_error(OnErrorPolicy::Continue),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Completed { record, .. } => {
                assert_eq!(record.output_port.as_deref(), Some("rejected"));
                assert_eq!(record.output_data.as_ref().unwrap()["code"], "action_error");
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn continue_error_output_uses_virtual_error_port() {
        let (graph, execution, executor) = setup(
            Some(subject(|_p, _c| {
                ActionResult::failure(ErrorData::new("action_error", "boom"))
            })),
            NodeSettings::default().with_on_error(OnErrorPolicy::ContinueErrorOutput),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Completed { record, .. } => {
                assert_eq!(record.output_port.as_deref(), Some("error"));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn schema_violation_is_not_retried() {
        let (graph, execution, executor) = setup(
            Some(Arc::new(Scripted {
                definition: ActionDefinition::action("test.subject", "Subject")
                    .with_params_schema(json!({
                        "type": "object",
                        "required": ["url"],
                        "properties": {"url": {"type": "string"}}
                    })),
                result: |_p, _c| ActionResult::success(json!(1)),
            })),
            // Retries configured, but schema failures bypass them.
            NodeSettings::default().with_retries(3, 10),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Failed { error, .. } => {
                assert_eq!(error.code, "workflow_error");
                assert_eq!(error.message, "Action parameters validation failed");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn context_updates_surface_on_completed_run() {
        let (graph, execution, executor) = setup(
            Some(subject(|_p, _c| {
                let mut updates = serde_json::Map::new();
                updates.insert("seen".into(), json!(1));
                ActionResult::success_with_context(json!(null), "main", updates)
            })),
            NodeSettings::default(),
            json!({}),
        );
        let node = graph.node("n").unwrap();

        let run = executor
            .execute(&graph, node, &execution, serde_json::Map::new(), attempt0())
            .await;
        match run {
            NodeRun::Completed {
                context_updates, ..
            } => {
                assert_eq!(context_updates.unwrap()["seen"], json!(1));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }
}
