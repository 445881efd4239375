//! Active-path and active-node tracking.
//!
//! Under loops, the audit trail accumulates records from every iteration;
//! these two maps discriminate the *current* iteration:
//!
//! - `active_paths` — completed nodes whose outputs are live (their most
//!   recent completed execution belongs to the current branch)
//! - `active_nodes` — nodes eligible to run next, keyed to the execution
//!   index their completion parent implies
//!
//! Both maps are maintained incrementally as nodes complete (the hot path)
//! and can be reconstructed from the audit trail alone (the cold path used
//! after a deserialization hop). The two must agree; the scenario suite
//! checks rebuilt state against live state after every kind of run.

use pulsar_core::NodeKey;
use pulsar_workflow::ExecutionGraph;

use crate::execution::{ActivePath, WorkflowExecution};
use crate::record::NodeExecution;

impl WorkflowExecution {
    /// Hot path: fold one completion into the active maps.
    ///
    /// The completed node leaves `active_nodes`; every target of its chosen
    /// output port becomes active at `execution_index + 1`. If the node was
    /// already on the live branch this is a loopback: every path entry
    /// recorded after its previous completion belongs to a stale iteration
    /// of the loop body and is dropped.
    pub(crate) fn apply_completion(
        &mut self,
        graph: &ExecutionGraph,
        node_key: &str,
        execution_index: u64,
        output_port: &str,
    ) {
        self.active_nodes.remove(node_key);

        for conn in graph.connections_from(node_key, output_port) {
            self.active_nodes.insert(conn.to.clone(), execution_index + 1);
        }

        if let Some(previous) = self.active_paths.get(node_key) {
            let stale_after = previous.execution_index;
            self.active_paths
                .retain(|_, path| path.execution_index <= stale_after);
        }
        self.active_paths
            .insert(node_key.to_string(), ActivePath { execution_index });
    }

    /// Cold path: rebuild both maps from the audit trail.
    ///
    /// Walks the graph from the trigger, following each node's recorded
    /// output port. A node whose newest completed record post-dates its
    /// parent's is on the live branch; one whose record pre-dates it belongs
    /// to an earlier iteration and is re-armed as active instead. The walk
    /// terminates because it only recurses on strictly-increasing execution
    /// indices, bounded by the record counter.
    pub(crate) fn rebuild_active_state(&mut self, graph: &ExecutionGraph) {
        self.active_paths.clear();
        self.active_nodes.clear();
        let trigger = self.trigger_node_key.clone();
        self.visit(graph, &trigger, None);
    }

    fn visit(&mut self, graph: &ExecutionGraph, node_key: &str, parent_index: Option<u64>) {
        let record = self
            .latest_completed_execution(node_key)
            .map(|r| (r.execution_index, r.output_port.clone().unwrap_or_default()));

        match record {
            Some((index, port)) if parent_index.is_none_or(|p| index > p) => {
                self.active_paths
                    .insert(node_key.to_string(), ActivePath { execution_index: index });
                let targets: Vec<NodeKey> = graph
                    .connections_from(node_key, &port)
                    .iter()
                    .map(|c| c.to.clone())
                    .collect();
                for target in targets {
                    self.visit(graph, &target, Some(index));
                }
            }
            // Not completed yet, or completed in an earlier iteration:
            // eligible to run at the index the parent implies. Live updates
            // arrive in completion (= index) order, so the last live writer
            // carries the largest parent index. Mirror that with `max`.
            _ => {
                let implied = parent_index.map_or(0, |p| p + 1);
                self.active_nodes
                    .entry(node_key.to_string())
                    .and_modify(|existing| *existing = (*existing).max(implied))
                    .or_insert(implied);
            }
        }
    }

    /// Returns `true` if the newest record of `node_key` is completed (the
    /// condition under which the runtime cache may hold its snapshot).
    #[must_use]
    pub fn latest_is_completed(&self, node_key: &str) -> bool {
        self.latest_execution(node_key)
            .is_some_and(NodeExecution::is_completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pulsar_core::WorkflowId;
    use pulsar_workflow::{Node, Workflow, compile};
    use serde_json::{Value, json};

    use crate::execution::DEFAULT_MAX_ITERATIONS;

    fn compile_workflow(wf: &Workflow) -> ExecutionGraph {
        compile(wf, "t").unwrap()
    }

    fn loop_workflow() -> ExecutionGraph {
        // t -> l -> p -> l, with an exit l --done--> out
        let wf = Workflow::new(WorkflowId::nil(), 1, "loop")
            .with_node(Node::new("t", "manual.trigger"))
            .with_node(Node::new("l", "test.router"))
            .with_node(Node::new("p", "test.echo"))
            .with_node(Node::new("out", "test.echo"))
            .connect("t", "l")
            .connect("l", "p")
            .connect("p", "l")
            .connect_ports("l", "done", "out", "input");
        compile_workflow(&wf)
    }

    fn started(graph: &ExecutionGraph) -> WorkflowExecution {
        let mut execution = WorkflowExecution::new(graph, "manual", json!({}), json!({}));
        execution.start(json!({}), DEFAULT_MAX_ITERATIONS).unwrap();
        execution
    }

    fn complete(
        execution: &mut WorkflowExecution,
        graph: &ExecutionGraph,
        key: &str,
        port: &str,
        output: Value,
    ) {
        let index = execution.current_execution_index;
        let run = execution.get_next_run_index(key);
        let mut record = NodeExecution::start(key, index, run);
        record.complete(output, port);
        execution.complete_node(graph, record);
    }

    fn rebuilt(execution: &WorkflowExecution, graph: &ExecutionGraph) -> WorkflowExecution {
        let mut back =
            WorkflowExecution::from_value(execution.to_value().unwrap()).unwrap();
        back.rebuild_runtime(graph, json!({}));
        back
    }

    #[test]
    fn completion_retargets_active_nodes() {
        let graph = loop_workflow();
        let mut execution = started(&graph);

        complete(&mut execution, &graph, "t", "main", json!(1));
        assert_eq!(execution.active_nodes.get("l"), Some(&1));
        assert!(!execution.active_nodes.contains_key("t"));

        complete(&mut execution, &graph, "l", "main", json!(1));
        assert_eq!(execution.active_nodes.get("p"), Some(&2));
        // Routing through "main" did not activate the "done" branch.
        assert!(!execution.active_nodes.contains_key("out"));
    }

    #[test]
    fn loopback_trims_stale_iteration() {
        let graph = loop_workflow();
        let mut execution = started(&graph);

        complete(&mut execution, &graph, "t", "main", json!(1)); // index 0
        complete(&mut execution, &graph, "l", "main", json!(1)); // index 1
        complete(&mut execution, &graph, "p", "main", json!(1)); // index 2
        complete(&mut execution, &graph, "l", "main", json!(2)); // index 3, loopback

        // p's entry (index 2 > l's previous 1) was trimmed; l re-entered.
        assert!(!execution.is_on_active_path("p"));
        assert_eq!(execution.active_paths["l"].execution_index, 3);
        assert_eq!(execution.active_paths["t"].execution_index, 0);
        assert_eq!(execution.active_nodes.get("p"), Some(&4));
    }

    #[test]
    fn rebuild_on_fresh_execution_arms_trigger() {
        let graph = loop_workflow();
        let mut execution = started(&graph);
        execution.rebuild_runtime(&graph, json!({}));

        assert_eq!(execution.active_nodes.get("t"), Some(&0));
        assert!(execution.active_paths.is_empty());
    }

    #[test]
    fn rebuild_matches_live_linear_progress() {
        let graph = loop_workflow();
        let mut execution = started(&graph);
        complete(&mut execution, &graph, "t", "main", json!(1));

        let back = rebuilt(&execution, &graph);
        assert_eq!(back.active_paths, execution.active_paths);
        assert_eq!(back.active_nodes, execution.active_nodes);
        assert_eq!(back.runtime.nodes, execution.runtime.nodes);
    }

    #[test]
    fn rebuild_matches_live_mid_loop() {
        let graph = loop_workflow();
        let mut execution = started(&graph);
        complete(&mut execution, &graph, "t", "main", json!(1));
        complete(&mut execution, &graph, "l", "main", json!(1));
        complete(&mut execution, &graph, "p", "main", json!(1));
        complete(&mut execution, &graph, "l", "main", json!(2));

        let back = rebuilt(&execution, &graph);
        assert_eq!(back.active_paths, execution.active_paths);
        assert_eq!(back.active_nodes, execution.active_nodes);
    }

    #[test]
    fn rebuild_after_loop_exit() {
        let graph = loop_workflow();
        let mut execution = started(&graph);
        complete(&mut execution, &graph, "t", "main", json!(1));
        complete(&mut execution, &graph, "l", "main", json!(1));
        complete(&mut execution, &graph, "p", "main", json!(1));
        complete(&mut execution, &graph, "l", "done", json!(2)); // exit the loop
        complete(&mut execution, &graph, "out", "main", json!(3));

        assert!(execution.active_nodes.is_empty());

        let back = rebuilt(&execution, &graph);
        assert_eq!(back.active_paths, execution.active_paths);
        assert_eq!(back.active_nodes, execution.active_nodes);
        assert_eq!(back.active_paths["out"].execution_index, 4);
    }

    #[test]
    fn rebuild_arms_node_with_stale_completion() {
        // After the loop re-enters l, p's old record pre-dates its parent:
        // the rebuild must re-arm p as active, not put it on the path.
        let graph = loop_workflow();
        let mut execution = started(&graph);
        complete(&mut execution, &graph, "t", "main", json!(1)); // 0
        complete(&mut execution, &graph, "l", "main", json!(1)); // 1
        complete(&mut execution, &graph, "p", "main", json!(1)); // 2
        complete(&mut execution, &graph, "l", "main", json!(2)); // 3

        let back = rebuilt(&execution, &graph);
        assert!(!back.is_on_active_path("p"));
        assert_eq!(back.active_nodes.get("p"), Some(&4));
    }

    #[test]
    fn fan_out_rebuild_takes_max_parent_index() {
        // t fans out to a and b; both feed c. After a and b complete, c's
        // implied index must come from the later parent.
        let wf = Workflow::new(WorkflowId::nil(), 1, "diamond")
            .with_node(Node::new("t", "manual.trigger"))
            .with_node(Node::new("a", "test.echo"))
            .with_node(Node::new("b", "test.echo"))
            .with_node(Node::new("c", "test.echo"))
            .connect("t", "a")
            .connect("t", "b")
            .connect("a", "c")
            .connect("b", "c");
        let graph = compile_workflow(&wf);
        let mut execution = started(&graph);

        complete(&mut execution, &graph, "t", "main", json!(1)); // 0
        complete(&mut execution, &graph, "a", "main", json!(1)); // 1
        complete(&mut execution, &graph, "b", "main", json!(2)); // 2

        let back = rebuilt(&execution, &graph);
        assert_eq!(back.active_nodes.get("c"), Some(&3));
        assert_eq!(back.active_nodes, execution.active_nodes);
    }

    #[test]
    fn latest_is_completed_tracks_newest_record() {
        let graph = loop_workflow();
        let mut execution = started(&graph);
        assert!(!execution.latest_is_completed("t"));
        complete(&mut execution, &graph, "t", "main", json!(1));
        assert!(execution.latest_is_completed("t"));
    }
}
