//! The audit-trail unit: one recorded attempt to run a node.

use chrono::{DateTime, Utc};
use pulsar_action::SuspensionType;
use pulsar_core::{ErrorData, NodeKey, PortKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::NodeStatus;
use crate::transition::can_transition_node;

/// One recorded attempt to run a node.
///
/// Created by the node executor in `running`, mutated only by it
/// (`running → completed | failed | suspended`), then appended to the
/// execution's audit trail. `execution_index` is the per-execution causal
/// clock; `run_index` counts attempts of the same node (retries replace the
/// same run index, loop re-entries increment it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    /// The node this record belongs to.
    pub node_key: NodeKey,
    /// Record status.
    pub status: NodeStatus,
    /// Params as evaluated for this attempt.
    #[serde(default)]
    pub params: Value,
    /// Output value (completed records only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data: Option<Value>,
    /// Output port the value was routed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_port: Option<PortKey>,
    /// Error (failed records only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_data: Option<ErrorData>,
    /// When this attempt started.
    pub started_at: DateTime<Utc>,
    /// When this attempt reached a terminal record state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration of the attempt, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Suspension tag (suspended records only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension_type: Option<SuspensionType>,
    /// Opaque suspension payload (suspended records only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension_data: Option<Value>,
    /// Global monotonic position within the execution.
    pub execution_index: u64,
    /// Per-node attempt counter.
    pub run_index: u64,
}

impl NodeExecution {
    /// Create a running record stamped with its indices and start time.
    #[must_use]
    pub fn start(node_key: impl Into<NodeKey>, execution_index: u64, run_index: u64) -> Self {
        Self {
            node_key: node_key.into(),
            status: NodeStatus::Running,
            params: Value::Object(serde_json::Map::new()),
            output_data: None,
            output_port: None,
            error_data: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            suspension_type: None,
            suspension_data: None,
            execution_index,
            run_index,
        }
    }

    /// Attach the evaluated params.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Mark completed with an output routed through `port`.
    pub fn complete(&mut self, output: Value, port: impl Into<PortKey>) {
        debug_assert!(can_transition_node(self.status, NodeStatus::Completed));
        self.status = NodeStatus::Completed;
        self.output_data = Some(output);
        self.output_port = Some(port.into());
        self.suspension_type = None;
        self.suspension_data = None;
        self.finish();
    }

    /// Mark failed with a structured error.
    pub fn fail(&mut self, error: ErrorData) {
        debug_assert!(can_transition_node(self.status, NodeStatus::Failed));
        self.status = NodeStatus::Failed;
        self.error_data = Some(error);
        self.finish();
    }

    /// Mark suspended with a tag and opaque payload.
    pub fn suspend(&mut self, suspension_type: SuspensionType, data: Value) {
        debug_assert!(can_transition_node(self.status, NodeStatus::Suspended));
        self.status = NodeStatus::Suspended;
        self.suspension_type = Some(suspension_type);
        self.suspension_data = Some(data);
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
    }

    /// Returns `true` for a completed record.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == NodeStatus::Completed
    }

    /// Returns `true` for a failed record.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == NodeStatus::Failed
    }

    /// Returns `true` for a suspended record.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.status == NodeStatus::Suspended
    }
}
