//! Static action metadata.

use pulsar_core::PortKey;
use serde::{Deserialize, Serialize};

/// Port key used when an action declares no input ports.
pub const DEFAULT_INPUT_PORT: &str = "input";

/// Port key used when an action declares no output ports.
pub const DEFAULT_OUTPUT_PORT: &str = "main";

/// Wildcard marker: an action whose `output_ports` is `["*"]` may route to
/// any non-empty port name (Switch-style dynamic outputs).
pub const WILDCARD_PORT: &str = "*";

/// Discriminant for the two action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Regular step executed mid-workflow.
    Action,
    /// Event source that starts a workflow.
    Trigger,
}

/// Static metadata describing an action type.
///
/// Used by the engine for action discovery, port routing, and params-schema
/// validation. The `key` is the node `type` string
/// (`"<integration>.<action>"`) workflows bind to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Unique key identifying this action type (e.g. `"http.request"`).
    pub key: String,
    /// Human-readable display name (e.g. `"HTTP Request"`).
    pub name: String,
    /// Whether this is a regular action or a trigger.
    pub kind: ActionKind,
    /// Declared input ports. Empty means the single default port `"input"`.
    #[serde(default)]
    pub input_ports: Vec<PortKey>,
    /// Declared output ports, or `["*"]` for dynamic outputs.
    /// Empty means the single default port `"main"`.
    #[serde(default)]
    pub output_ports: Vec<PortKey>,
    /// JSON Schema the expanded params must satisfy (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_schema: Option<serde_json::Value>,
}

impl ActionDefinition {
    /// Create a definition with the default single input/output port.
    #[must_use]
    pub fn new(key: impl Into<String>, name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            kind,
            input_ports: vec![DEFAULT_INPUT_PORT.to_string()],
            output_ports: vec![DEFAULT_OUTPUT_PORT.to_string()],
            params_schema: None,
        }
    }

    /// Create a trigger definition.
    #[must_use]
    pub fn trigger(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(key, name, ActionKind::Trigger)
    }

    /// Create a regular action definition.
    #[must_use]
    pub fn action(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(key, name, ActionKind::Action)
    }

    /// Replace the declared input ports.
    #[must_use]
    pub fn with_input_ports(mut self, ports: impl IntoIterator<Item = impl Into<PortKey>>) -> Self {
        self.input_ports = ports.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the declared output ports.
    #[must_use]
    pub fn with_output_ports(mut self, ports: impl IntoIterator<Item = impl Into<PortKey>>) -> Self {
        self.output_ports = ports.into_iter().map(Into::into).collect();
        self
    }

    /// Declare wildcard outputs: any non-empty port name is routable.
    #[must_use]
    pub fn with_wildcard_outputs(mut self) -> Self {
        self.output_ports = vec![WILDCARD_PORT.to_string()];
        self
    }

    /// Attach a JSON Schema for params validation.
    #[must_use]
    pub fn with_params_schema(mut self, schema: serde_json::Value) -> Self {
        self.params_schema = Some(schema);
        self
    }

    /// Effective input ports (the default port when none are declared).
    #[must_use]
    pub fn effective_input_ports(&self) -> Vec<PortKey> {
        if self.input_ports.is_empty() {
            vec![DEFAULT_INPUT_PORT.to_string()]
        } else {
            self.input_ports.clone()
        }
    }

    /// First declared output port, falling back to `"main"`.
    #[must_use]
    pub fn first_output_port(&self) -> PortKey {
        self.output_ports
            .first()
            .filter(|p| p.as_str() != WILDCARD_PORT)
            .cloned()
            .unwrap_or_else(|| DEFAULT_OUTPUT_PORT.to_string())
    }

    /// Returns `true` if any non-empty port name may be routed to.
    #[must_use]
    pub fn allows_any_output(&self) -> bool {
        self.output_ports.len() == 1 && self.output_ports[0] == WILDCARD_PORT
    }

    /// Returns `true` if `port` is a legal output for this action.
    #[must_use]
    pub fn is_valid_output_port(&self, port: &str) -> bool {
        if self.allows_any_output() {
            !port.is_empty()
        } else {
            self.output_ports.iter().any(|p| p == port)
        }
    }

    /// Returns `true` if this is a trigger definition.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.kind == ActionKind::Trigger
    }
}
