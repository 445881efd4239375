//! Execution- and node-level lifecycle statuses.

use serde::{Deserialize, Serialize};

/// The overall status of a workflow execution.
///
/// All statuses are plain snake_case strings on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created but not yet started.
    #[default]
    Pending,
    /// Actively stepping through nodes.
    Running,
    /// Paused awaiting an external event (webhook, timer, child workflow, retry).
    Suspended,
    /// All reachable work finished successfully.
    Completed,
    /// A node failure (or structural safeguard) ended the execution.
    Failed,
    /// The host cancelled the execution between steps.
    Cancelled,
    /// The host declared a wall-clock timeout.
    Timeout,
}

impl ExecutionStatus {
    /// Returns `true` if the execution has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout
        )
    }

    /// Returns `true` if the execution is currently being driven.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if the execution finished successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// The status of a single node execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Created but not yet dispatched.
    #[default]
    Pending,
    /// Currently being evaluated.
    Running,
    /// Finished and published its output.
    Completed,
    /// Finished with an unrecoverable error.
    Failed,
    /// Paused awaiting resume (including retry delays).
    Suspended,
}

impl NodeStatus {
    /// Returns `true` for the two final record states.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Suspended => "suspended",
        };
        f.write_str(s)
    }
}

/// How the host wants the execution driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Caller blocks on the result.
    #[default]
    Sync,
    /// Caller polls or is notified later.
    Async,
    /// Result is discarded.
    FireAndForget,
}
