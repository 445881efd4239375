//! Structured error values.

use serde::{Deserialize, Serialize};

/// A structured error value `{code, message, details}`.
///
/// This is the error *currency* of the engine: it travels inside
/// action results, audit records, and failed executions, and it
/// serializes to a plain JSON object. It is deliberately not a Rust
/// `Error` type: a failed node is data, not a panic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Machine-readable error code (e.g. `"action_error"`).
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Optional structured details about the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorData {
    /// Create an error with a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a plain JSON object.
    ///
    /// Falls back to a minimal object if serialization fails (it cannot
    /// for this shape, but the conversion stays total).
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "code": self.code, "message": self.message })
        })
    }
}

impl std::fmt::Display for ErrorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
