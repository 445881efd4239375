//! Workflow → `ExecutionGraph` compilation.
//!
//! Compilation is pure: same workflow + trigger in, same graph out. The
//! result is cacheable across executions of the same workflow version.
//!
//! Steps:
//!
//! 1. Validate node keys and connection endpoints.
//! 2. BFS from the trigger over forward connections; drop unreachable nodes
//!    and any connection incident to them.
//! 3. Build the routing indexes: `(from, from_port) → [connection]`, the
//!    reverse index, and the distinct-source dependency map.
//! 4. Detect loops (Tarjan SCCs, refined recursively for nesting) and stamp
//!    `loop_level` / `loop_role` / `loop_ids` onto each node.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use pulsar_core::{NodeKey, PortKey};
use tracing::debug;

use crate::connection::Connection;
use crate::error::CompileError;
use crate::graph::ExecutionGraph;
use crate::node::{LoopRole, NodeMetadata};
use crate::workflow::Workflow;

/// Compile a workflow into an execution graph rooted at `trigger_node_key`.
pub fn compile(
    workflow: &Workflow,
    trigger_node_key: &str,
) -> Result<ExecutionGraph, CompileError> {
    validate_node_keys(workflow)?;
    validate_trigger(workflow, trigger_node_key)?;
    validate_connections(workflow)?;

    // ── Reachability ────────────────────────────────────────────────────
    // BFS discovery order doubles as the "topological index" used by the
    // loop-role tie-breaks, so it must be deterministic: ports are visited
    // in sorted order, connections in declaration order.
    let forward = forward_adjacency(workflow);
    let mut order: Vec<NodeKey> = Vec::new();
    let mut discovery: HashMap<NodeKey, usize> = HashMap::new();
    let mut queue = VecDeque::new();

    discovery.insert(trigger_node_key.to_string(), 0);
    order.push(trigger_node_key.to_string());
    queue.push_back(trigger_node_key.to_string());

    while let Some(current) = queue.pop_front() {
        for conn in forward.get(current.as_str()).into_iter().flatten() {
            if !discovery.contains_key(&conn.to) {
                discovery.insert(conn.to.clone(), order.len());
                order.push(conn.to.clone());
                queue.push_back(conn.to.clone());
            }
        }
    }

    debug!(
        workflow_id = %workflow.id,
        version = workflow.version,
        reachable = order.len(),
        total = workflow.nodes.len(),
        "compiled reachable set"
    );

    // ── Node map (declaration order, pruned) ────────────────────────────
    let mut node_map: IndexMap<NodeKey, crate::node::Node> = workflow
        .nodes
        .iter()
        .filter(|n| discovery.contains_key(&n.key))
        .cloned()
        .map(|mut n| {
            n.metadata = NodeMetadata::default();
            (n.key.clone(), n)
        })
        .collect();

    // ── Routing indexes ─────────────────────────────────────────────────
    let mut connection_map: HashMap<(NodeKey, PortKey), Vec<Connection>> = HashMap::new();
    let mut reverse_connection_map: HashMap<NodeKey, Vec<Connection>> = HashMap::new();
    let mut dependency_graph: HashMap<NodeKey, Vec<NodeKey>> = HashMap::new();

    for conn in workflow.all_connections() {
        if !discovery.contains_key(&conn.from) || !discovery.contains_key(&conn.to) {
            continue; // incident to a pruned node
        }
        connection_map
            .entry((conn.from.clone(), conn.from_port.clone()))
            .or_default()
            .push(conn.clone());
        reverse_connection_map
            .entry(conn.to.clone())
            .or_default()
            .push(conn.clone());
        let deps = dependency_graph.entry(conn.to.clone()).or_default();
        if !deps.contains(&conn.from) {
            deps.push(conn.from.clone());
        }
    }

    // ── Loop detection ──────────────────────────────────────────────────
    let edges: BTreeSet<(usize, usize)> = connection_map
        .values()
        .flatten()
        .map(|c| (discovery[&c.from], discovery[&c.to]))
        .collect();
    let scope: BTreeSet<usize> = (0..order.len()).collect();
    let mut annotator = LoopAnnotator::default();
    annotator.detect(&scope, &edges, 1);

    for (index, info) in &annotator.info {
        let key = &order[*index];
        if let Some(node) = node_map.get_mut(key) {
            node.metadata = NodeMetadata {
                loop_level: info.level,
                loop_role: info.role,
                loop_ids: info.loop_ids.clone(),
            };
        }
    }

    Ok(ExecutionGraph {
        workflow_id: workflow.id,
        version: workflow.version,
        trigger_node_key: trigger_node_key.to_string(),
        node_map,
        connection_map,
        reverse_connection_map,
        dependency_graph,
        variables: workflow.variables.clone(),
    })
}

// ── Validation ──────────────────────────────────────────────────────────────

fn validate_node_keys(workflow: &Workflow) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    for node in &workflow.nodes {
        if !seen.insert(node.key.as_str()) {
            return Err(CompileError::DuplicateNodeKey {
                key: node.key.clone(),
            });
        }
    }
    Ok(())
}

fn validate_trigger(workflow: &Workflow, trigger: &str) -> Result<(), CompileError> {
    if workflow.node(trigger).is_some() {
        return Ok(());
    }
    let referenced = workflow
        .connections
        .iter()
        .flat_map(|(_, by_port)| by_port.values().flatten())
        .any(|c| c.from == trigger || c.to == trigger);
    if referenced {
        Err(CompileError::UnreachableTrigger {
            key: trigger.to_string(),
        })
    } else {
        Err(CompileError::TriggerNotFound {
            key: trigger.to_string(),
        })
    }
}

fn validate_connections(workflow: &Workflow) -> Result<(), CompileError> {
    let keys: HashSet<&str> = workflow.nodes.iter().map(|n| n.key.as_str()).collect();
    let mut dangling: Vec<&Connection> = workflow
        .connections
        .values()
        .flat_map(|by_port| by_port.values().flatten())
        .filter(|c| !keys.contains(c.from.as_str()) || !keys.contains(c.to.as_str()))
        .collect();
    dangling.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
    if let Some(conn) = dangling.first() {
        return Err(CompileError::DanglingConnection {
            from: conn.from.clone(),
            to: conn.to.clone(),
        });
    }
    Ok(())
}

/// Per-node outgoing connections with ports visited in sorted order.
fn forward_adjacency(workflow: &Workflow) -> HashMap<&str, Vec<&Connection>> {
    let mut adjacency: HashMap<&str, Vec<&Connection>> = HashMap::new();
    for (from, by_port) in &workflow.connections {
        let mut ports: Vec<&String> = by_port.keys().collect();
        ports.sort();
        let conns = adjacency.entry(from.as_str()).or_default();
        for port in ports {
            conns.extend(&by_port[port]);
        }
    }
    adjacency
}

// ── Loop annotation ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct LoopInfo {
    level: u32,
    role: LoopRole,
    loop_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct LoopAnnotator {
    next_seq: u32,
    /// Keyed by BFS discovery index.
    info: HashMap<usize, LoopInfo>,
}

impl LoopAnnotator {
    /// Find non-trivial SCCs within `scope`, annotate their members at
    /// `depth`, then recurse into each SCC with its back edges removed to
    /// uncover nested loops one level deeper.
    ///
    /// Terminates because each recursion strictly removes the edges closing
    /// the current cycle.
    fn detect(&mut self, scope: &BTreeSet<usize>, edges: &BTreeSet<(usize, usize)>, depth: u32) {
        let mut graph = DiGraph::<usize, ()>::new();
        let mut petgraph_index: HashMap<usize, NodeIndex> = HashMap::new();
        for &member in scope {
            petgraph_index.insert(member, graph.add_node(member));
        }
        for &(a, b) in edges {
            graph.add_edge(petgraph_index[&a], petgraph_index[&b], ());
        }

        let mut sccs: Vec<BTreeSet<usize>> = tarjan_scc(&graph)
            .into_iter()
            .map(|component| component.into_iter().map(|ix| graph[ix]).collect())
            .filter(|component: &BTreeSet<usize>| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&only| edges.contains(&(only, only)))
            })
            .collect();
        // Deterministic loop numbering: outermost-to-innermost, then by the
        // earliest-discovered member.
        sccs.sort_by_key(|component| component.first().copied().unwrap_or(usize::MAX));

        for members in sccs {
            let loop_id = format!("loop_{}", self.next_seq);
            self.next_seq += 1;

            let entry = Self::entry_node(&members, edges);
            let closer = Self::closing_node(&members, edges, entry);

            for &member in &members {
                let role = if member == entry {
                    LoopRole::StartLoop
                } else if Some(member) == closer {
                    LoopRole::EndLoop
                } else {
                    LoopRole::InLoop
                };
                // Deeper recursions overwrite level and role (innermost
                // wins) and prepend their loop id.
                let info = self.info.entry(member).or_insert_with(|| LoopInfo {
                    level: depth,
                    role,
                    loop_ids: Vec::new(),
                });
                info.level = depth;
                info.role = role;
                info.loop_ids.insert(0, loop_id.clone());
            }

            // Remove the back edges into the entry and look for inner loops.
            let inner_edges: BTreeSet<(usize, usize)> = edges
                .iter()
                .filter(|(a, b)| members.contains(a) && members.contains(b) && *b != entry)
                .copied()
                .collect();
            if !inner_edges.is_empty() {
                self.detect(&members, &inner_edges, depth + 1);
            }
        }
    }

    /// The loop's re-entry point: the member with the lowest discovery index
    /// among targets of edges entering the SCC; for a loop with no entering
    /// edges (the trigger sits inside it), the lowest-discovered member.
    fn entry_node(members: &BTreeSet<usize>, edges: &BTreeSet<(usize, usize)>) -> usize {
        edges
            .iter()
            .filter(|(a, b)| !members.contains(a) && members.contains(b))
            .map(|(_, b)| *b)
            .min()
            .or_else(|| members.first().copied())
            .unwrap_or_default()
    }

    /// The member whose edge closes the cycle back to `entry`, preferring a
    /// node other than the entry itself (a pure self-loop closes on itself).
    fn closing_node(
        members: &BTreeSet<usize>,
        edges: &BTreeSet<(usize, usize)>,
        entry: usize,
    ) -> Option<usize> {
        let closers: BTreeSet<usize> = edges
            .iter()
            .filter(|(a, b)| members.contains(a) && *b == entry)
            .map(|(a, _)| *a)
            .collect();
        closers
            .iter()
            .find(|&&c| c != entry)
            .or_else(|| closers.first())
            .copied()
    }
}
