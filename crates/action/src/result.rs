//! The action result protocol.

use pulsar_core::{ErrorData, PortKey};
use serde_json::Value;

use crate::suspension::SuspensionType;

/// Result of one action invocation, carrying both data and flow-control
/// intent.
///
/// The engine matches on this enum to decide what happens next:
/// - `Success` → route `output` through the chosen output port to dependents
/// - `Suspend` → persist the execution and yield to the host until the
///   external condition (webhook, timer, child workflow) triggers
/// - `Failure` → apply the node's retry policy, then its on-error policy
///
/// The protocol is a closed sum type, so an ill-shaped return is
/// unrepresentable: shape validation happens at compile time in the
/// action, not at runtime in the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// Successful completion.
    Success {
        /// The produced output value.
        output: Value,
        /// Output port to route through; `None` means the action's first
        /// declared output port.
        port: Option<PortKey>,
        /// Updates to merge into the shared workflow context.
        context_updates: Option<serde_json::Map<String, Value>>,
    },

    /// Pause until an external condition is met.
    Suspend {
        /// What the execution is waiting for.
        suspension_type: SuspensionType,
        /// Opaque payload stored on the audit record (shape per type, see
        /// [`suspension`](crate::suspension)).
        data: Value,
    },

    /// The action failed.
    Failure {
        /// Structured error describing the failure.
        error: ErrorData,
        /// Optional port for error routing under the `continue` policy.
        port: Option<PortKey>,
    },
}

impl ActionResult {
    /// Successful result routed through the default output port.
    #[must_use]
    pub fn success(output: Value) -> Self {
        Self::Success {
            output,
            port: None,
            context_updates: None,
        }
    }

    /// Successful result routed through an explicit port.
    #[must_use]
    pub fn success_with_port(output: Value, port: impl Into<PortKey>) -> Self {
        Self::Success {
            output,
            port: Some(port.into()),
            context_updates: None,
        }
    }

    /// Successful result that also updates the shared workflow context.
    #[must_use]
    pub fn success_with_context(
        output: Value,
        port: impl Into<PortKey>,
        updates: serde_json::Map<String, Value>,
    ) -> Self {
        Self::Success {
            output,
            port: Some(port.into()),
            context_updates: Some(updates),
        }
    }

    /// Suspension result.
    #[must_use]
    pub fn suspend(suspension_type: SuspensionType, data: Value) -> Self {
        Self::Suspend {
            suspension_type,
            data,
        }
    }

    /// Failure result.
    #[must_use]
    pub fn failure(error: ErrorData) -> Self {
        Self::Failure { error, port: None }
    }

    /// Failure result with an explicit error-routing port.
    #[must_use]
    pub fn failure_with_port(error: ErrorData, port: impl Into<PortKey>) -> Self {
        Self::Failure {
            error,
            port: Some(port.into()),
        }
    }

    /// Returns `true` for a `Success` result.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns `true` for a `Suspend` result.
    #[must_use]
    pub fn is_suspend(&self) -> bool {
        matches!(self, Self::Suspend { .. })
    }

    /// Returns `true` for a `Failure` result.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}
