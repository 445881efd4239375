//! Port-to-port connections between nodes.

use std::collections::HashMap;

use pulsar_core::{NodeKey, PortKey};
use serde::{Deserialize, Serialize};

/// A directed edge `(from, from_port) → (to, to_port)`.
///
/// Multiple connections may share the same `(from, from_port)` (fan-out) or
/// the same `(to, to_port)` (fan-in).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Source node key.
    pub from: NodeKey,
    /// Output port on the source node.
    pub from_port: PortKey,
    /// Destination node key.
    pub to: NodeKey,
    /// Input port on the destination node.
    pub to_port: PortKey,
}

impl Connection {
    /// Create a connection.
    #[must_use]
    pub fn new(
        from: impl Into<NodeKey>,
        from_port: impl Into<PortKey>,
        to: impl Into<NodeKey>,
        to_port: impl Into<PortKey>,
    ) -> Self {
        Self {
            from: from.into(),
            from_port: from_port.into(),
            to: to.into(),
            to_port: to_port.into(),
        }
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}] -> {}[{}]",
            self.from, self.from_port, self.to, self.to_port
        )
    }
}

/// The definition-side connection layout: `from → from_port → connections`.
pub type ConnectionIndex = HashMap<NodeKey, HashMap<PortKey, Vec<Connection>>>;
