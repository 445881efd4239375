//! The main execution loop.

use std::sync::Arc;

use pulsar_action::definition::DEFAULT_INPUT_PORT;
use pulsar_action::{ActionRegistry, SuspensionType};
use pulsar_core::{NodeKey, PortKey};
use pulsar_execution::{DEFAULT_MAX_ITERATIONS, WorkflowExecution};
use pulsar_expression::{Evaluator, TemplateEvaluator};
use pulsar_workflow::{ExecutionGraph, Node};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EngineError, codes};
use crate::middleware::{EventKind, ExecutionEvent, Middleware, MiddlewareStack};
use crate::node_executor::{NodeExecutor, NodeRun, RunAttempt};

/// Tunable knobs of the graph executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Structural loop-protection ceiling per drive of an execution.
    pub max_iterations: u32,
    /// Host environment data exposed to expressions and actions as `env`.
    pub env: Value,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            env: Value::Object(serde_json::Map::new()),
        }
    }
}

/// Control flow after merging one node result.
enum Flow {
    Continue,
    Stop,
}

/// The sequential evaluator driving one execution at a time.
///
/// Owns no execution state itself (every run is an owned
/// [`WorkflowExecution`] value handed in and out), so one executor may be
/// shared across any number of concurrent executions.
pub struct GraphExecutor {
    registry: Arc<ActionRegistry>,
    node_executor: NodeExecutor,
    middleware: MiddlewareStack,
    cancellation: CancellationToken,
    config: ExecutorConfig,
}

impl GraphExecutor {
    /// Create an executor over a registry, using the default template
    /// evaluator and configuration.
    #[must_use]
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        let evaluator: Arc<dyn Evaluator> = Arc::new(TemplateEvaluator::new());
        Self {
            node_executor: NodeExecutor::new(Arc::clone(&registry), evaluator),
            registry,
            middleware: MiddlewareStack::new(),
            cancellation: CancellationToken::new(),
            config: ExecutorConfig::default(),
        }
    }

    /// Replace the expression evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.node_executor = NodeExecutor::new(Arc::clone(&self.registry), evaluator);
        self
    }

    /// Append a middleware layer.
    #[must_use]
    pub fn with_middleware(mut self, layer: Arc<dyn Middleware>) -> Self {
        self.middleware.push(layer);
        self
    }

    /// Set the loop-protection ceiling.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the host environment data.
    #[must_use]
    pub fn with_env(mut self, env: Value) -> Self {
        self.config.env = env;
        self
    }

    /// Use a host-provided cancellation token (checked between steps).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The token that cancels executions driven by this executor.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    // ── Entry points ────────────────────────────────────────────────────

    /// Run a fresh execution of `graph` to completion, suspension, or
    /// failure.
    ///
    /// Workflow failures are data: the returned execution carries status
    /// `failed` and the error. `Err` is reserved for host-protocol misuse.
    pub async fn execute(
        &self,
        graph: &ExecutionGraph,
        trigger_type: impl Into<String>,
        trigger_data: Value,
        vars: Value,
    ) -> Result<WorkflowExecution, EngineError> {
        let mut execution = WorkflowExecution::new(graph, trigger_type, trigger_data, vars);
        info!(execution_id = %execution.id, workflow_id = %graph.workflow_id, "starting execution");

        if let Err(error) = self.prepare_nodes(graph, &mut execution).await {
            execution.fail(error.clone())?;
            self.emit(EventKind::ExecutionFailed, &execution, None, error.to_value());
            return Ok(execution);
        }

        execution.start(self.config.env.clone(), self.config.max_iterations)?;
        self.emit(
            EventKind::ExecutionStarted,
            &execution,
            None,
            json!({"trigger_type": execution.trigger_type}),
        );

        self.run_loop(graph, &mut execution).await?;
        Ok(execution)
    }

    /// Resume a suspended execution with host-supplied data.
    ///
    /// Rebuilds the runtime cache if the execution arrived cold (e.g. after
    /// a deserialization hop), overwrites the suspended record with the
    /// resumed attempt, then continues the main loop.
    pub async fn resume(
        &self,
        graph: &ExecutionGraph,
        mut execution: WorkflowExecution,
        resume_data: Value,
    ) -> Result<WorkflowExecution, EngineError> {
        if execution.status != pulsar_execution::ExecutionStatus::Suspended {
            return Err(EngineError::NotSuspended);
        }
        if !execution.runtime.hydrated {
            execution.rebuild_runtime(graph, self.config.env.clone());
        }
        // The driving executor's ceiling applies to this segment of the run.
        execution.runtime.max_iterations = self.config.max_iterations;

        let suspension_type = execution
            .suspension_type
            .clone()
            .ok_or(EngineError::NotSuspended)?;
        let node_key = execution.resume_suspension()?;
        let node = graph
            .node(&node_key)
            .ok_or_else(|| EngineError::SuspendedNodeMissing(node_key.clone()))?;

        // The suspended record this resume overwrites (verified to exist by
        // resume_suspension).
        let (run_index, suspension_data) = execution
            .latest_execution(&node_key)
            .map(|record| (record.run_index, record.suspension_data.clone()))
            .ok_or_else(|| EngineError::SuspendedNodeMissing(node_key.clone()))?;

        info!(execution_id = %execution.id, node_key = %node_key,
              suspension_type = %suspension_type, "resuming execution");

        let routed_input = self.build_routed_input(graph, &execution, node);
        let attempt = RunAttempt {
            execution_index: execution.current_execution_index,
            run_index,
            attempt_number: retry_attempt_number(&suspension_type, suspension_data.as_ref()),
        };

        let run = if suspension_type.is_retry() {
            // A retry re-executes the action from scratch, counting from
            // the recorded attempt number.
            self.node_executor
                .execute(graph, node, &execution, routed_input, attempt)
                .await
        } else {
            self.node_executor
                .resume_suspended(graph, node, &execution, routed_input, resume_data, attempt)
                .await
        };

        if let Flow::Continue = self.merge(graph, &mut execution, run)? {
            self.run_loop(graph, &mut execution).await?;
        }
        Ok(execution)
    }

    // ── The loop ────────────────────────────────────────────────────────

    async fn run_loop(
        &self,
        graph: &ExecutionGraph,
        execution: &mut WorkflowExecution,
    ) -> Result<(), EngineError> {
        loop {
            if self.cancellation.is_cancelled() {
                execution.cancel()?;
                self.emit(EventKind::ExecutionCancelled, execution, None, json!({}));
                return Ok(());
            }
            if execution.status.is_terminal() {
                return Ok(());
            }

            // Running out of work wins over the iteration ceiling: a loop
            // whose final exit lands exactly on the limit still completes.
            let Some(node_key) = execution.find_next_ready_node(graph, &self.registry) else {
                execution.complete()?;
                self.emit(
                    EventKind::ExecutionCompleted,
                    execution,
                    None,
                    json!({"steps": execution.current_execution_index}),
                );
                return Ok(());
            };
            if execution.runtime.iteration_count >= execution.runtime.max_iterations {
                let error = codes::infinite_loop_protection(
                    execution.runtime.iteration_count,
                    execution.runtime.max_iterations,
                );
                warn!(execution_id = %execution.id, "loop protection triggered");
                execution.fail(error.clone())?;
                self.emit(EventKind::ExecutionFailed, execution, None, error.to_value());
                return Ok(());
            }
            let node = graph
                .node(&node_key)
                .ok_or_else(|| EngineError::UnknownNode(node_key.clone()))?;

            let attempt = RunAttempt {
                execution_index: execution.current_execution_index,
                run_index: execution.get_next_run_index(&node_key),
                attempt_number: 0,
            };
            let routed_input = self.build_routed_input(graph, execution, node);
            let run = self
                .node_executor
                .execute(graph, node, execution, routed_input, attempt)
                .await;

            if let Flow::Stop = self.merge(graph, execution, run)? {
                return Ok(());
            }
        }
    }

    /// Fold one node result back into the execution.
    fn merge(
        &self,
        graph: &ExecutionGraph,
        execution: &mut WorkflowExecution,
        run: NodeRun,
    ) -> Result<Flow, EngineError> {
        match run {
            NodeRun::Completed {
                record,
                context_updates,
            } => {
                if let Some(updates) = context_updates {
                    execution.update_execution_context(updates);
                }
                let node_key = record.node_key.clone();
                let event_data = json!({
                    "node_key": node_key,
                    "execution_index": record.execution_index,
                    "run_index": record.run_index,
                    "output_port": record.output_port,
                });
                // Completing a node already on the live branch closes a
                // loop iteration; the check must precede the path update.
                let looped = execution.is_on_active_path(&node_key);
                execution.complete_node(graph, record);
                if looped {
                    execution.increment_iteration_count();
                    debug!(node_key = %node_key,
                           iteration = execution.runtime.iteration_count, "loopback");
                }
                self.emit(
                    EventKind::NodeCompleted,
                    execution,
                    Some(&node_key),
                    event_data,
                );
                Ok(Flow::Continue)
            }
            NodeRun::Suspended { record } => {
                let node_key = record.node_key.clone();
                let suspension_type = record
                    .suspension_type
                    .clone()
                    .unwrap_or(SuspensionType::Custom("unknown".to_string()));
                let suspension_data = record.suspension_data.clone().unwrap_or(Value::Null);
                execution.add_node_execution(record);
                execution.suspend(&node_key, suspension_type.clone(), suspension_data.clone())?;
                self.emit(
                    EventKind::ExecutionSuspended,
                    execution,
                    Some(&node_key),
                    json!({
                        "node_key": node_key,
                        "suspension_type": suspension_type,
                        "suspension_data": suspension_data,
                    }),
                );
                Ok(Flow::Stop)
            }
            NodeRun::Failed { record, error } => {
                let node_key = record.node_key.clone();
                execution.fail_node(record);
                execution.fail(error.clone())?;
                self.emit(
                    EventKind::NodeFailed,
                    execution,
                    Some(&node_key),
                    error.to_value(),
                );
                self.emit(EventKind::ExecutionFailed, execution, None, error.to_value());
                Ok(Flow::Stop)
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    /// Run every reachable node's `prepare` hook once, in graph order.
    ///
    /// Like action invocation, preparation runs behind a panic fence: a
    /// panicking hook fails the execution instead of unwinding the host.
    async fn prepare_nodes(
        &self,
        graph: &ExecutionGraph,
        execution: &mut WorkflowExecution,
    ) -> Result<(), pulsar_core::ErrorData> {
        use futures::FutureExt;

        for node in graph.nodes() {
            let Some(action) = self.registry.get(&node.kind) else {
                continue; // surfaces as action_not_found at dispatch
            };
            let prepared = std::panic::AssertUnwindSafe(action.prepare(&node.params))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(pulsar_core::ErrorData::new(
                        "action_execution_failed",
                        "prepare hook panicked",
                    ))
                });
            match prepared {
                Ok(Some(data)) => {
                    execution.preparation_data.insert(node.key.clone(), data);
                }
                Ok(None) => {}
                Err(inner) => {
                    return Err(codes::action_preparation_failed(&node.key, inner));
                }
            }
        }
        Ok(())
    }

    /// Routed input per the connection map, with the trigger payload
    /// injected on the trigger node's unconnected first input port.
    fn build_routed_input(
        &self,
        graph: &ExecutionGraph,
        execution: &WorkflowExecution,
        node: &Node,
    ) -> serde_json::Map<String, Value> {
        let input_ports = self.input_ports_of(node);
        let mut routed = execution.routed_input(graph, &node.key, &input_ports);

        if node.key == graph.trigger_node_key {
            if let Some(first) = input_ports.first() {
                let connected = graph
                    .incoming(&node.key)
                    .iter()
                    .any(|conn| conn.to_port == *first);
                if !connected && !routed.contains_key(first) {
                    routed.insert(first.clone(), execution.trigger_data.clone());
                }
            }
        }
        routed
    }

    fn input_ports_of(&self, node: &Node) -> Vec<PortKey> {
        self.registry
            .get(&node.kind)
            .map_or_else(
                || vec![DEFAULT_INPUT_PORT.to_string()],
                |action| action.definition().effective_input_ports(),
            )
    }

    fn emit(
        &self,
        kind: EventKind,
        execution: &WorkflowExecution,
        node_key: Option<&NodeKey>,
        data: Value,
    ) {
        let event = ExecutionEvent {
            kind,
            execution_id: execution.id,
            workflow_id: execution.workflow_id,
            node_key: node_key.cloned(),
        };
        let _ = self.middleware.dispatch(&event, data);
    }
}

impl std::fmt::Debug for GraphExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphExecutor")
            .field("actions", &self.registry.len())
            .field("middleware", &self.middleware.len())
            .field("max_iterations", &self.config.max_iterations)
            .finish()
    }
}

/// The attempt counter a resumed run starts from: retries continue where
/// the suspension left off, everything else restarts at zero.
fn retry_attempt_number(suspension_type: &SuspensionType, data: Option<&Value>) -> u32 {
    if !suspension_type.is_retry() {
        return 0;
    }
    data.and_then(|d| d.get("attempt_number"))
        .and_then(Value::as_u64)
        .map_or(0, |n| n as u32)
}
