//! Compilation errors.

use thiserror::Error;

/// Errors produced while compiling a workflow into an execution graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The requested trigger key names no node in the workflow.
    #[error("trigger not found: no node with key `{key}`")]
    TriggerNotFound {
        /// The missing trigger key.
        key: String,
    },

    /// The trigger key appears only as a connection endpoint, never as a
    /// defined node.
    #[error("unreachable trigger: `{key}` is referenced by connections but not defined")]
    UnreachableTrigger {
        /// The undefined trigger key.
        key: String,
    },

    /// Two nodes share the same key.
    #[error("duplicate node key: `{key}`")]
    DuplicateNodeKey {
        /// The duplicated key.
        key: String,
    },

    /// A connection references a node that does not exist.
    #[error("dangling connection: `{from}` -> `{to}` references an undefined node")]
    DanglingConnection {
        /// Source key of the offending connection.
        from: String,
        /// Destination key of the offending connection.
        to: String,
    },
}
