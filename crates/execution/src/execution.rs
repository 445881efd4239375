//! The root execution aggregate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pulsar_action::SuspensionType;
use pulsar_core::{ErrorData, ExecutionId, NodeKey, PortKey, WorkflowId};
use pulsar_workflow::ExecutionGraph;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::StateError;
use crate::record::NodeExecution;
use crate::status::{ExecutionMode, ExecutionStatus};
use crate::transition::validate_execution_transition;

/// Default structural loop-protection budget.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Persistent execution data shared across steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextData {
    /// The shared workflow context (accumulated action `context_updates`).
    #[serde(default)]
    pub workflow: serde_json::Map<String, Value>,
    /// Per-node context maps.
    #[serde(default)]
    pub node: HashMap<NodeKey, Value>,
}

/// Marker that a node's most recent completed execution lies on the current
/// live branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePath {
    /// Index of that completed execution.
    pub execution_index: u64,
}

/// Cached view of a node's latest completed output, used for routing and
/// expression contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    /// The output value.
    pub output: Value,
    /// The port it was routed through.
    pub output_port: PortKey,
    /// The execution index it was produced at.
    pub execution_index: u64,
}

/// Transient, rebuildable runtime state.
///
/// Never serialized; [`WorkflowExecution::rebuild_runtime`] reconstructs it
/// from the audit trail after a deserialization hop.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeState {
    /// Latest completed output per node (populated iff the node's newest
    /// record is completed).
    pub nodes: HashMap<NodeKey, NodeSnapshot>,
    /// Host environment data exposed to expressions and actions.
    pub env: Value,
    /// Loopback completions observed in the current drive.
    pub iteration_count: u32,
    /// Structural loop-protection ceiling.
    pub max_iterations: u32,
    /// Whether this runtime state has been initialized for the current
    /// process (fresh start or rebuild).
    pub hydrated: bool,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            env: Value::Null,
            iteration_count: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            hydrated: false,
        }
    }
}

/// The root aggregate of one workflow run.
///
/// Persistent fields (everything serialized) are the audit trail, the
/// suspension record, contexts, and the active-path bookkeeping; the
/// [`RuntimeState`] cache is `#[serde(skip)]` and always derivable from
/// them plus the compiled graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Unique id of this run.
    pub id: ExecutionId,
    /// The workflow definition executed.
    pub workflow_id: WorkflowId,
    /// The definition version the graph was compiled from.
    pub workflow_version: u64,
    /// Parent execution, for sub-workflow runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<ExecutionId>,
    /// How the host drives this run.
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Lifecycle status.
    pub status: ExecutionStatus,
    /// When the run started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// The error that failed the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,

    /// Audit trail: per-node records, newest first.
    #[serde(default)]
    pub node_executions: HashMap<NodeKey, Vec<NodeExecution>>,
    /// Monotonic record counter; the next record takes this value.
    #[serde(default)]
    pub current_execution_index: u64,

    /// Node the run is suspended on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_node_key: Option<NodeKey>,
    /// What the run is waiting for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension_type: Option<SuspensionType>,
    /// Opaque suspension payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension_data: Option<Value>,
    /// When the run suspended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_at: Option<DateTime<Utc>>,

    /// Shared and per-node context data.
    #[serde(default)]
    pub context_data: ContextData,
    /// Completed nodes currently on the live branch.
    #[serde(default)]
    pub active_paths: HashMap<NodeKey, ActivePath>,
    /// Nodes eligible to run next, keyed to the index they would take.
    #[serde(default)]
    pub active_nodes: HashMap<NodeKey, u64>,
    /// Pre-flight results per node (`Action::prepare`).
    #[serde(default)]
    pub preparation_data: HashMap<NodeKey, Value>,

    /// Entry node of the compiled graph.
    pub trigger_node_key: NodeKey,
    /// What kind of trigger started the run (e.g. `"manual"`, `"webhook"`).
    pub trigger_type: String,
    /// The trigger payload, routed into the trigger node.
    #[serde(default)]
    pub trigger_data: Value,
    /// Run-scoped variables (override workflow variables).
    #[serde(default)]
    pub vars: Value,

    /// Rebuildable runtime cache.
    #[serde(skip)]
    pub runtime: RuntimeState,
}

impl WorkflowExecution {
    /// Create a pending execution for a compiled graph.
    #[must_use]
    pub fn new(
        graph: &ExecutionGraph,
        trigger_type: impl Into<String>,
        trigger_data: Value,
        vars: Value,
    ) -> Self {
        Self {
            id: ExecutionId::v4(),
            workflow_id: graph.workflow_id,
            workflow_version: graph.version,
            parent_execution_id: None,
            mode: ExecutionMode::default(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            error: None,
            node_executions: HashMap::new(),
            current_execution_index: 0,
            suspended_node_key: None,
            suspension_type: None,
            suspension_data: None,
            suspended_at: None,
            context_data: ContextData::default(),
            active_paths: HashMap::new(),
            active_nodes: HashMap::new(),
            preparation_data: HashMap::new(),
            trigger_node_key: graph.trigger_node_key.clone(),
            trigger_type: trigger_type.into(),
            trigger_data,
            vars,
            runtime: RuntimeState::default(),
        }
    }

    /// Set the execution mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Mark this run as a child of another execution.
    #[must_use]
    pub fn with_parent(mut self, parent: ExecutionId) -> Self {
        self.parent_execution_id = Some(parent);
        self
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Start the run: `pending → running`, seed the runtime state, and make
    /// the trigger node the only active node (at index 0).
    pub fn start(&mut self, env: Value, max_iterations: u32) -> Result<(), StateError> {
        self.transition(ExecutionStatus::Running)?;
        self.started_at = Some(Utc::now());
        self.active_nodes.clear();
        self.active_nodes.insert(self.trigger_node_key.clone(), 0);
        self.active_paths.clear();
        self.runtime = RuntimeState {
            env,
            max_iterations,
            hydrated: true,
            ..RuntimeState::default()
        };
        Ok(())
    }

    /// Finish successfully.
    pub fn complete(&mut self) -> Result<(), StateError> {
        self.transition(ExecutionStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Finish with a failure.
    pub fn fail(&mut self, error: ErrorData) -> Result<(), StateError> {
        self.transition(ExecutionStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
        Ok(())
    }

    /// Cancel between steps (cooperative).
    pub fn cancel(&mut self) -> Result<(), StateError> {
        self.transition(ExecutionStatus::Cancelled)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Suspend on `node_key` awaiting an external event.
    pub fn suspend(
        &mut self,
        node_key: impl Into<NodeKey>,
        suspension_type: SuspensionType,
        suspension_data: Value,
    ) -> Result<(), StateError> {
        self.transition(ExecutionStatus::Suspended)?;
        self.suspended_node_key = Some(node_key.into());
        self.suspension_type = Some(suspension_type);
        self.suspension_data = Some(suspension_data);
        self.suspended_at = Some(Utc::now());
        Ok(())
    }

    /// Clear the suspension and hand the execution back to the evaluator.
    ///
    /// Decrements the record counter so the resumed node takes the same
    /// index as the suspended record it will overwrite, which is only
    /// sound if that record exists and is still suspended, so both are
    /// verified first.
    pub fn resume_suspension(&mut self) -> Result<NodeKey, StateError> {
        if self.status != ExecutionStatus::Suspended {
            return Err(StateError::NotSuspended);
        }
        let node_key = self
            .suspended_node_key
            .clone()
            .ok_or(StateError::NotSuspended)?;
        let replaceable = self
            .latest_execution(&node_key)
            .is_some_and(NodeExecution::is_suspended);
        if !replaceable {
            return Err(StateError::SuspendedRecordMissing { node_key });
        }

        self.transition(ExecutionStatus::Running)?;
        self.suspended_node_key = None;
        self.suspension_type = None;
        self.suspension_data = None;
        self.suspended_at = None;
        self.current_execution_index -= 1;
        Ok(node_key)
    }

    fn transition(&mut self, to: ExecutionStatus) -> Result<(), StateError> {
        validate_execution_transition(self.status, to)?;
        debug!(execution_id = %self.id, from = %self.status, to = %to, "execution transition");
        self.status = to;
        Ok(())
    }

    // ── Audit trail ─────────────────────────────────────────────────────

    /// Append a record to the audit trail (or replace the newest record of
    /// the same node when it carries the same `run_index`, the retry /
    /// resume overwrite), then bump the record counter.
    pub fn add_node_execution(&mut self, record: NodeExecution) {
        let list = self.node_executions.entry(record.node_key.clone()).or_default();
        let replaces_head = list
            .first()
            .is_some_and(|head| head.run_index == record.run_index);
        if replaces_head {
            list[0] = record;
        } else {
            list.insert(0, record);
        }
        self.current_execution_index += 1;
    }

    /// Record a completed node: append, refresh the runtime cache, and
    /// re-target the active paths/nodes maps.
    pub fn complete_node(&mut self, graph: &ExecutionGraph, record: NodeExecution) {
        debug_assert!(record.is_completed());
        let node_key = record.node_key.clone();
        let execution_index = record.execution_index;
        let output_port = record.output_port.clone().unwrap_or_default();

        if let Some(output) = record.output_data.clone() {
            self.runtime.nodes.insert(
                node_key.clone(),
                NodeSnapshot {
                    output,
                    output_port: output_port.clone(),
                    execution_index,
                },
            );
        }
        self.add_node_execution(record);
        self.apply_completion(graph, &node_key, execution_index, &output_port);
    }

    /// Record a failed node. Appends only: failed nodes publish no output
    /// and do not disturb the active maps (the caller applies the on-error
    /// policy).
    pub fn fail_node(&mut self, record: NodeExecution) {
        debug_assert!(record.is_failed());
        self.add_node_execution(record);
    }

    /// The `run_index` the next attempt of `node_key` should take.
    #[must_use]
    pub fn get_next_run_index(&self, node_key: &str) -> u64 {
        self.latest_execution(node_key)
            .map_or(0, |record| record.run_index + 1)
    }

    /// Newest record for a node.
    #[must_use]
    pub fn latest_execution(&self, node_key: &str) -> Option<&NodeExecution> {
        self.node_executions
            .get(node_key)
            .and_then(|records| records.first())
    }

    /// Newest *completed* record for a node.
    #[must_use]
    pub fn latest_completed_execution(&self, node_key: &str) -> Option<&NodeExecution> {
        self.node_executions
            .get(node_key)
            .and_then(|records| records.iter().find(|r| r.is_completed()))
    }

    /// Returns `true` if the node has any completed record.
    #[must_use]
    pub fn has_completed_execution(&self, node_key: &str) -> bool {
        self.latest_completed_execution(node_key).is_some()
    }

    /// Total number of records in the audit trail.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.node_executions.values().map(Vec::len).sum()
    }

    // ── Contexts ────────────────────────────────────────────────────────

    /// Merge updates into the shared workflow context.
    pub fn update_execution_context(&mut self, updates: serde_json::Map<String, Value>) {
        for (key, value) in updates {
            self.context_data.workflow.insert(key, value);
        }
    }

    /// A node's context map (empty object if absent).
    #[must_use]
    pub fn get_node_context(&self, node_key: &str) -> Value {
        self.context_data
            .node
            .get(node_key)
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }

    /// Merge updates into a node's context map.
    pub fn update_node_context(
        &mut self,
        node_key: impl Into<NodeKey>,
        updates: serde_json::Map<String, Value>,
    ) {
        let entry = self
            .context_data
            .node
            .entry(node_key.into())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(map) = entry {
            for (key, value) in updates {
                map.insert(key, value);
            }
        } else {
            *entry = Value::Object(updates);
        }
    }

    // ── Runtime ─────────────────────────────────────────────────────────

    /// Count one loopback completion.
    pub fn increment_iteration_count(&mut self) {
        self.runtime.iteration_count += 1;
    }

    /// Returns `true` if the node's most recent completed execution is on
    /// the current live branch.
    #[must_use]
    pub fn is_on_active_path(&self, node_key: &str) -> bool {
        self.active_paths.contains_key(node_key)
    }

    /// The `nodes` view for expression/action contexts:
    /// `{key: {"output": ..., "context": ...}}`.
    #[must_use]
    pub fn nodes_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, snapshot) in &self.runtime.nodes {
            let mut entry = serde_json::Map::new();
            entry.insert("output".to_string(), snapshot.output.clone());
            entry.insert("context".to_string(), self.get_node_context(key));
            map.insert(key.clone(), Value::Object(entry));
        }
        Value::Object(map)
    }

    /// Rebuild the transient runtime cache (and the active maps) from the
    /// audit trail.
    ///
    /// Deterministic: continuing from the rebuilt state makes the same
    /// next-step decisions the live state would have. The iteration counter
    /// restarts at zero, so each drive of the execution gets the full
    /// loop-protection budget.
    pub fn rebuild_runtime(&mut self, graph: &ExecutionGraph, env: Value) {
        let max_iterations = self.runtime.max_iterations;
        self.runtime = RuntimeState {
            env,
            max_iterations,
            hydrated: true,
            ..RuntimeState::default()
        };

        for (node_key, records) in &self.node_executions {
            let Some(newest) = records.first() else {
                continue;
            };
            if !newest.is_completed() {
                continue;
            }
            if let Some(output) = newest.output_data.clone() {
                self.runtime.nodes.insert(
                    node_key.clone(),
                    NodeSnapshot {
                        output,
                        output_port: newest.output_port.clone().unwrap_or_default(),
                        execution_index: newest.execution_index,
                    },
                );
            }
        }

        self.rebuild_active_state(graph);
        debug!(
            execution_id = %self.id,
            cached_nodes = self.runtime.nodes.len(),
            active_nodes = self.active_nodes.len(),
            "runtime rebuilt from audit trail"
        );
    }

    // ── Serialization ───────────────────────────────────────────────────

    /// Serialize to a plain JSON value (runtime cache excluded).
    pub fn to_value(&self) -> Result<Value, StateError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from a plain JSON value. The runtime cache comes back
    /// cold; call [`rebuild_runtime`](Self::rebuild_runtime) before
    /// driving the execution.
    pub fn from_value(value: Value) -> Result<Self, StateError> {
        Ok(serde_json::from_value(value)?)
    }
}
