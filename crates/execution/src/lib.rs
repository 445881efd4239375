#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Pulsar Execution
//!
//! Execution state for the Pulsar workflow engine: the persistent audit
//! trail, the rebuildable runtime cache, and the algorithms that decide what
//! runs next.
//!
//! This crate models execution-time state. It does NOT contain the engine
//! orchestrator. It defines:
//!
//! - [`ExecutionStatus`] / [`NodeStatus`] — the two lifecycle state machines,
//!   with transitions validated by the [`transition`] module
//! - [`NodeExecution`] — one recorded attempt to run a node (the audit unit)
//! - [`WorkflowExecution`] — the root aggregate: audit trail, suspension
//!   record, contexts, active paths/nodes, and the `#[serde(skip)]` runtime
//!   cache restored by `rebuild_runtime`
//! - Active-path / active-node maintenance and audit-trail reconstruction
//!   (the [`active`] module)
//! - Port satisfaction, routed-input construction, and next-node selection
//!   (the [`routing`] module)
//!
//! The core invariant: the runtime cache is a pure function of the audit
//! trail plus the compiled graph, so an execution serialized mid-flight and
//! rehydrated elsewhere makes exactly the same next-step decisions.

pub mod active;
pub mod error;
pub mod execution;
pub mod record;
pub mod routing;
pub mod status;
pub mod transition;

pub use error::StateError;
pub use execution::{
    ActivePath, ContextData, DEFAULT_MAX_ITERATIONS, NodeSnapshot, RuntimeState,
    WorkflowExecution,
};
pub use record::NodeExecution;
pub use status::{ExecutionMode, ExecutionStatus, NodeStatus};
