//! State machine transition validation for execution and node statuses.

use crate::error::StateError;
use crate::status::{ExecutionStatus, NodeStatus};

/// Returns `true` if the execution-level transition from `from` to `to` is valid.
#[must_use]
pub fn can_transition_execution(from: ExecutionStatus, to: ExecutionStatus) -> bool {
    matches!(
        (from, to),
        (ExecutionStatus::Pending, ExecutionStatus::Running)
            | (ExecutionStatus::Pending, ExecutionStatus::Failed)
            | (ExecutionStatus::Pending, ExecutionStatus::Cancelled)
            | (ExecutionStatus::Running, ExecutionStatus::Suspended)
            | (ExecutionStatus::Running, ExecutionStatus::Completed)
            | (ExecutionStatus::Running, ExecutionStatus::Failed)
            | (ExecutionStatus::Running, ExecutionStatus::Cancelled)
            | (ExecutionStatus::Running, ExecutionStatus::Timeout)
            | (ExecutionStatus::Suspended, ExecutionStatus::Running)
            | (ExecutionStatus::Suspended, ExecutionStatus::Cancelled)
            | (ExecutionStatus::Suspended, ExecutionStatus::Failed)
            | (ExecutionStatus::Suspended, ExecutionStatus::Timeout)
    )
}

/// Validate an execution-level transition, returning an error if invalid.
pub fn validate_execution_transition(
    from: ExecutionStatus,
    to: ExecutionStatus,
) -> Result<(), StateError> {
    if can_transition_execution(from, to) {
        Ok(())
    } else {
        Err(StateError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Returns `true` if the node-level transition from `from` to `to` is valid.
#[must_use]
pub fn can_transition_node(from: NodeStatus, to: NodeStatus) -> bool {
    matches!(
        (from, to),
        (NodeStatus::Pending, NodeStatus::Running)
            | (NodeStatus::Running, NodeStatus::Completed)
            | (NodeStatus::Running, NodeStatus::Failed)
            | (NodeStatus::Running, NodeStatus::Suspended)
            | (NodeStatus::Suspended, NodeStatus::Running)
    )
}

/// Validate a node-level transition, returning an error if invalid.
pub fn validate_node_transition(from: NodeStatus, to: NodeStatus) -> Result<(), StateError> {
    if can_transition_node(from, to) {
        Ok(())
    } else {
        Err(StateError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
