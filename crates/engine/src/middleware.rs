//! Host-registered event interceptors.
//!
//! Hosts attach ordered [`Middleware`] layers to observe (and transform)
//! engine events: logging, persistence triggers, metrics. Each layer
//! receives the event, the payload, and a [`Next`] continuation; it may
//! transform the payload, pass it on, or short-circuit by returning without
//! calling `next`. A panicking layer is logged and skipped, and the pipeline
//! continues with the payload as that layer received it.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use pulsar_core::{ExecutionId, NodeKey, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// The engine events middleware can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The execution entered `running`.
    ExecutionStarted,
    /// A node completed and published output.
    NodeCompleted,
    /// A node failed fatally.
    NodeFailed,
    /// The execution suspended awaiting an external event.
    ExecutionSuspended,
    /// The execution completed successfully.
    ExecutionCompleted,
    /// The execution failed.
    ExecutionFailed,
    /// The execution was cancelled between steps.
    ExecutionCancelled,
}

/// One engine event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEvent {
    /// What happened.
    pub kind: EventKind,
    /// The execution it happened to.
    pub execution_id: ExecutionId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The node involved, for node-level events.
    pub node_key: Option<NodeKey>,
}

/// The continuation of the middleware chain.
pub struct Next<'a> {
    layers: &'a [Arc<dyn Middleware>],
    event: &'a ExecutionEvent,
}

impl Next<'_> {
    /// Run the remainder of the chain with `data`.
    #[must_use]
    pub fn run(self, data: Value) -> Value {
        run_chain(self.layers, self.event, data)
    }
}

/// An interceptor in the event pipeline.
pub trait Middleware: Send + Sync {
    /// Handle `event`, returning the (possibly transformed) payload.
    ///
    /// Call `next.run(data)` to continue the chain; returning without doing
    /// so short-circuits the layers after this one.
    fn call(&self, event: &ExecutionEvent, data: Value, next: Next<'_>) -> Value;
}

impl<F> Middleware for F
where
    F: for<'a> Fn(&ExecutionEvent, Value, Next<'a>) -> Value + Send + Sync,
{
    fn call(&self, event: &ExecutionEvent, data: Value, next: Next<'_>) -> Value {
        self(event, data, next)
    }
}

fn run_chain(layers: &[Arc<dyn Middleware>], event: &ExecutionEvent, data: Value) -> Value {
    let Some((head, rest)) = layers.split_first() else {
        return data;
    };
    let input = data.clone();
    match catch_unwind(AssertUnwindSafe(|| {
        head.call(event, data, Next { layers: rest, event })
    })) {
        Ok(output) => output,
        Err(_) => {
            warn!(kind = ?event.kind, "middleware layer panicked; continuing pipeline");
            run_chain(rest, event, input)
        }
    }
}

/// An ordered stack of middleware layers.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer. First registered, first invoked.
    #[must_use]
    pub fn with_layer(mut self, layer: Arc<dyn Middleware>) -> Self {
        self.layers.push(layer);
        self
    }

    /// Append a layer in place.
    pub fn push(&mut self, layer: Arc<dyn Middleware>) {
        self.layers.push(layer);
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no layers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run the full chain for one event, returning the final payload.
    #[must_use]
    pub fn dispatch(&self, event: &ExecutionEvent, data: Value) -> Value {
        run_chain(&self.layers, event, data)
    }
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("layers", &self.layers.len())
            .finish()
    }
}
