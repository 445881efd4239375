#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Pulsar Engine
//!
//! The evaluator of the Pulsar workflow engine: a single-threaded,
//! suspension-aware state machine that drives a compiled
//! [`ExecutionGraph`](pulsar_workflow::ExecutionGraph) to completion.
//!
//! - [`GraphExecutor`] — the main loop: selects the next ready node
//!   (deepest-first over the active set), dispatches it, merges the result,
//!   and terminates on completion, suspension, iteration-limit breach, or
//!   fatal error. Entry points: [`GraphExecutor::execute`] and
//!   [`GraphExecutor::resume`].
//! - [`NodeExecutor`] — one node's lifecycle: param templating, schema
//!   validation, invocation behind a panic fence, result classification,
//!   retry policy, on-error policy.
//! - [`MiddlewareStack`] — host-registered interceptors notified of
//!   execution/node events.
//!
//! Within one execution the evaluator is strictly sequential; across
//! executions any number may run in parallel, each owning its
//! [`WorkflowExecution`](pulsar_execution::WorkflowExecution) value and
//! sharing the immutable graph.

pub mod error;
pub mod executor;
pub mod middleware;
pub mod node_executor;
pub mod retry;

pub use error::EngineError;
pub use executor::{ExecutorConfig, GraphExecutor};
pub use middleware::{EventKind, ExecutionEvent, Middleware, MiddlewareStack, Next};
pub use node_executor::{NodeExecutor, NodeRun, RunAttempt};
