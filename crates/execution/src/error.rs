//! Execution-state errors.

use thiserror::Error;

/// Errors raised by `WorkflowExecution` state operations.
///
/// These signal host-protocol misuse (resuming a running execution, illegal
/// lifecycle transitions); node *failures* are data, carried as
/// [`ErrorData`](pulsar_core::ErrorData) on records and the execution.
#[derive(Debug, Error)]
pub enum StateError {
    /// A lifecycle transition is not valid for the current status.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },

    /// `resume_suspension` was called on an execution that is not suspended.
    #[error("execution is not suspended")]
    NotSuspended,

    /// The suspension record the resume would overwrite is missing or not in
    /// the suspended state.
    #[error("no suspended record for node `{node_key}` to resume")]
    SuspendedRecordMissing {
        /// The node the execution claims to be suspended on.
        node_key: String,
    },

    /// A serialization or deserialization error.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
