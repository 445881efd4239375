//! Workflow nodes and their compiler-filled metadata.

use pulsar_core::NodeKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::settings::NodeSettings;

/// Where a node sits relative to the loops of its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopRole {
    /// Re-entry point of a loop (target of the edges entering the cycle).
    StartLoop,
    /// Member of a loop body.
    InLoop,
    /// The node whose outgoing edge closes the cycle back to the start.
    EndLoop,
    /// Not part of any loop.
    #[default]
    NotInLoop,
}

/// Loop annotations stamped onto a node by the compiler.
///
/// Workflow authors leave this at its default; [`compile`](crate::compile)
/// overwrites it on the graph's copy of each node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Loop nesting depth (0 = not in any loop).
    #[serde(default)]
    pub loop_level: u32,
    /// Role within the innermost containing loop.
    #[serde(default)]
    pub loop_role: LoopRole,
    /// Ids of all containing loops, innermost first.
    #[serde(default)]
    pub loop_ids: Vec<String>,
}

impl NodeMetadata {
    /// Returns `true` if the node belongs to at least one loop.
    #[must_use]
    pub fn in_loop(&self) -> bool {
        self.loop_level > 0
    }
}

/// One typed step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Key unique within the workflow (e.g. `"fetch_user"`).
    pub key: NodeKey,
    /// Human-readable display name.
    pub name: String,
    /// Action type this node binds to (e.g. `"http.request"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Template-bearing parameter map, expanded per dispatch.
    #[serde(default = "default_params")]
    pub params: Value,
    /// Compiler-filled loop annotations.
    #[serde(default)]
    pub metadata: NodeMetadata,
    /// Retry and on-error configuration.
    #[serde(default)]
    pub settings: NodeSettings,
}

fn default_params() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Node {
    /// Create a node whose display name is its key.
    #[must_use]
    pub fn new(key: impl Into<NodeKey>, kind: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            kind: kind.into(),
            params: default_params(),
            metadata: NodeMetadata::default(),
            settings: NodeSettings::default(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the parameter map.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Set the retry / on-error settings.
    #[must_use]
    pub fn with_settings(mut self, settings: NodeSettings) -> Self {
        self.settings = settings;
        self
    }
}
