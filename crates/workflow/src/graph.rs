//! The compiled, immutable execution graph.

use std::collections::HashMap;

use indexmap::IndexMap;
use pulsar_core::{NodeKey, PortKey, WorkflowId};
use serde_json::Value;

use crate::connection::Connection;
use crate::node::Node;

/// A compiled workflow: pruned to the trigger's reachable set and indexed
/// for O(1) routing lookups.
///
/// Immutable after [`compile`](crate::compile); share it freely (read-only)
/// across executions, typically as `Arc<ExecutionGraph>` via the
/// [`GraphCache`](crate::GraphCache).
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    /// The workflow this graph was compiled from.
    pub workflow_id: WorkflowId,
    /// The definition version this graph was compiled from.
    pub version: u64,
    /// The node the execution starts at.
    pub trigger_node_key: NodeKey,
    pub(crate) node_map: IndexMap<NodeKey, Node>,
    pub(crate) connection_map: HashMap<(NodeKey, PortKey), Vec<Connection>>,
    pub(crate) reverse_connection_map: HashMap<NodeKey, Vec<Connection>>,
    pub(crate) dependency_graph: HashMap<NodeKey, Vec<NodeKey>>,
    pub(crate) variables: serde_json::Map<String, Value>,
}

impl ExecutionGraph {
    /// Look up a reachable node by key.
    #[must_use]
    pub fn node(&self, key: &str) -> Option<&Node> {
        self.node_map.get(key)
    }

    /// Returns `true` if `key` survived pruning.
    #[must_use]
    pub fn contains_node(&self, key: &str) -> bool {
        self.node_map.contains_key(key)
    }

    /// The trigger node.
    ///
    /// Present by construction; compilation fails otherwise.
    #[must_use]
    pub fn trigger_node(&self) -> &Node {
        &self.node_map[&self.trigger_node_key]
    }

    /// Reachable nodes, in workflow declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_map.values()
    }

    /// Reachable node keys, in workflow declaration order.
    pub fn node_keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.node_map.keys()
    }

    /// Number of reachable nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns `true` if the graph has no nodes (never true post-compile).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// Outgoing connections at `(from, from_port)`.
    #[must_use]
    pub fn connections_from(&self, from: &str, from_port: &str) -> &[Connection] {
        self.connection_map
            .get(&(from.to_string(), from_port.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All incoming connections of `to` (filter by `to_port` at use).
    #[must_use]
    pub fn incoming(&self, to: &str) -> &[Connection] {
        self.reverse_connection_map
            .get(to)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Distinct prerequisite node keys of `key` (sources of incoming edges).
    #[must_use]
    pub fn dependencies(&self, key: &str) -> &[NodeKey] {
        self.dependency_graph
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The workflow's read-only variables.
    #[must_use]
    pub fn variables(&self) -> &serde_json::Map<String, Value> {
        &self.variables
    }
}
