//! String keys for nodes and ports.
//!
//! Unlike the UUID identifiers in [`id`](crate::id), node and port keys are
//! chosen by the workflow author (`"fetch_user"`, `"main"`, `"error"`) and
//! travel verbatim through definitions, connections, and audit records, so
//! they stay plain strings.

/// Key uniquely identifying a node within one workflow (e.g. `"fetch_user"`).
pub type NodeKey = String;

/// Key of an input or output port on a node (e.g. `"input"`, `"main"`, `"error"`).
pub type PortKey = String;
