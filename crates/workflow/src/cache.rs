//! Shared cache of compiled execution graphs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use pulsar_core::WorkflowId;

use crate::compiler::compile;
use crate::error::CompileError;
use crate::graph::ExecutionGraph;
use crate::workflow::Workflow;

/// Thread-safe cache of compiled graphs keyed by `(workflow_id, version)`.
///
/// Compilation is pure, so a graph compiled once can be shared read-only by
/// every execution of that workflow version.
#[derive(Debug, Default)]
pub struct GraphCache {
    graphs: RwLock<HashMap<(WorkflowId, u64), Arc<ExecutionGraph>>>,
}

impl GraphCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a cached graph, if present.
    #[must_use]
    pub fn get(&self, workflow_id: WorkflowId, version: u64) -> Option<Arc<ExecutionGraph>> {
        self.graphs.read().get(&(workflow_id, version)).cloned()
    }

    /// Return the cached graph for this workflow version, compiling and
    /// inserting it on a miss.
    pub fn get_or_compile(
        &self,
        workflow: &Workflow,
        trigger_node_key: &str,
    ) -> Result<Arc<ExecutionGraph>, CompileError> {
        if let Some(graph) = self.get(workflow.id, workflow.version) {
            return Ok(graph);
        }
        let graph = Arc::new(compile(workflow, trigger_node_key)?);
        self.graphs
            .write()
            .insert((workflow.id, workflow.version), Arc::clone(&graph));
        Ok(graph)
    }

    /// Drop every cached graph of a workflow (all versions).
    pub fn invalidate(&self, workflow_id: WorkflowId) {
        self.graphs.write().retain(|(id, _), _| *id != workflow_id);
    }

    /// Number of cached graphs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graphs.read().len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.read().is_empty()
    }
}
