//! The declarative workflow definition.

use pulsar_core::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::{Connection, ConnectionIndex};
use crate::node::Node;

/// A declarative workflow: nodes plus port-labelled directed connections.
///
/// This is the author-facing input. The engine never executes it directly:
/// it executes the [`ExecutionGraph`](crate::ExecutionGraph) produced by
/// [`compile`](crate::compile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Definition id, stable across versions.
    pub id: WorkflowId,
    /// Definition version; bumped whenever the graph changes.
    pub version: u64,
    /// Human-readable display name.
    pub name: String,
    /// Ordered node sequence (order is preserved into the compiled graph).
    pub nodes: Vec<Node>,
    /// Connection layout `from → from_port → [connection]`.
    #[serde(default)]
    pub connections: ConnectionIndex,
    /// Workflow variables, read-only during execution.
    #[serde(default)]
    pub variables: serde_json::Map<String, Value>,
}

impl Workflow {
    /// Create an empty workflow.
    #[must_use]
    pub fn new(id: WorkflowId, version: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            version,
            name: name.into(),
            nodes: Vec::new(),
            connections: ConnectionIndex::new(),
            variables: serde_json::Map::new(),
        }
    }

    /// Append a node.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Connect `from`'s `"main"` output to `to`'s `"input"` port.
    #[must_use]
    pub fn connect(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.connect_ports(from, "main", to, "input")
    }

    /// Connect an explicit `(from, from_port) → (to, to_port)` pair.
    #[must_use]
    pub fn connect_ports(
        mut self,
        from: impl Into<String>,
        from_port: impl Into<String>,
        to: impl Into<String>,
        to_port: impl Into<String>,
    ) -> Self {
        let conn = Connection::new(from, from_port, to, to_port);
        self.connections
            .entry(conn.from.clone())
            .or_default()
            .entry(conn.from_port.clone())
            .or_default()
            .push(conn);
        self
    }

    /// Set a workflow variable.
    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    /// Find a node by key.
    #[must_use]
    pub fn node(&self, key: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.key == key)
    }

    /// All connections, flattened, in `nodes` order then port order.
    pub fn all_connections(&self) -> impl Iterator<Item = &Connection> {
        self.nodes.iter().flat_map(move |node| {
            let mut ports: Vec<&String> = self
                .connections
                .get(&node.key)
                .map(|by_port| by_port.keys().collect())
                .unwrap_or_default();
            ports.sort();
            ports.into_iter().flat_map(move |port| {
                self.connections
                    .get(&node.key)
                    .and_then(|by_port| by_port.get(port))
                    .map(Vec::as_slice)
                    .unwrap_or_default()
                    .iter()
            })
        })
    }
}
