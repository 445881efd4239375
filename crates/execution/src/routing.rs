//! Port satisfaction, routed-input construction, and next-node selection.

use std::cmp::Reverse;

use pulsar_action::ActionRegistry;
use pulsar_action::definition::DEFAULT_INPUT_PORT;
use pulsar_core::{NodeKey, PortKey};
use pulsar_workflow::ExecutionGraph;
use serde_json::Value;
use tracing::trace;

use crate::execution::WorkflowExecution;

impl WorkflowExecution {
    /// Returns `true` if every declared input port of the node either has no
    /// incoming connections or has at least one source with a completed
    /// record. Fan-in is OR: any completed source satisfies the port.
    #[must_use]
    pub fn input_ports_satisfied(
        &self,
        graph: &ExecutionGraph,
        node_key: &str,
        input_ports: &[PortKey],
    ) -> bool {
        input_ports.iter().all(|port| {
            let mut incoming = graph
                .incoming(node_key)
                .iter()
                .filter(|conn| conn.to_port == *port)
                .peekable();
            if incoming.peek().is_none() {
                return true;
            }
            incoming.any(|conn| self.has_completed_execution(&conn.from))
        })
    }

    /// Build the routed input map `{port → value}` for a node.
    ///
    /// Per port: each incoming connection contributes its source's *latest*
    /// record, provided that record completed through the connection's
    /// source port; with several candidates the greatest `execution_index`
    /// wins (most recent iteration). Ports with no valid candidate are
    /// omitted.
    #[must_use]
    pub fn routed_input(
        &self,
        graph: &ExecutionGraph,
        node_key: &str,
        input_ports: &[PortKey],
    ) -> serde_json::Map<String, Value> {
        let mut routed = serde_json::Map::new();

        for port in input_ports {
            let candidate = graph
                .incoming(node_key)
                .iter()
                .filter(|conn| conn.to_port == *port)
                .filter_map(|conn| {
                    let latest = self.latest_execution(&conn.from)?;
                    let matches = latest.is_completed()
                        && latest.output_port.as_deref() == Some(conn.from_port.as_str());
                    matches.then_some(latest)
                })
                .max_by_key(|record| record.execution_index);

            if let Some(record) = candidate {
                routed.insert(
                    port.clone(),
                    record.output_data.clone().unwrap_or(Value::Null),
                );
            }
        }
        routed
    }

    /// Select the next node to run: among active nodes whose input ports are
    /// satisfied, the one with the highest active index (deepest first),
    /// ties broken lexicographically by key.
    ///
    /// A node whose action is unknown to the registry is still selectable;
    /// dispatch surfaces the missing action as a workflow failure.
    #[must_use]
    pub fn find_next_ready_node(
        &self,
        graph: &ExecutionGraph,
        registry: &ActionRegistry,
    ) -> Option<NodeKey> {
        let mut candidates: Vec<(&NodeKey, u64)> = self
            .active_nodes
            .iter()
            .map(|(key, index)| (key, *index))
            .collect();
        candidates.sort_by_key(|(key, index)| (Reverse(*index), (*key).clone()));

        for (key, index) in candidates {
            let Some(node) = graph.node(key) else {
                continue;
            };
            let input_ports = registry
                .get(&node.kind)
                .map_or_else(default_input_ports, |action| {
                    action.definition().effective_input_ports()
                });
            if self.input_ports_satisfied(graph, key, &input_ports) {
                trace!(node_key = %key, active_index = index, "selected next node");
                return Some(key.clone());
            }
        }
        None
    }
}

fn default_input_ports() -> Vec<PortKey> {
    vec![DEFAULT_INPUT_PORT.to_string()]
}
