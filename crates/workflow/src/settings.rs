//! Per-node retry and failure-handling settings.

use serde::{Deserialize, Serialize};

/// What to do with a node failure that cannot (or can no longer) be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnErrorPolicy {
    /// Fail the whole execution (the default).
    #[default]
    StopWorkflow,
    /// Synthesize a completed record carrying the error structure on the
    /// node's first declared output port; downstream continues.
    Continue,
    /// Same, but route through the virtual `"error"` port.
    ContinueErrorOutput,
}

/// Retry and on-error configuration for a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Whether failures are retried at all.
    #[serde(default)]
    pub retry_on_failed: bool,
    /// Maximum number of retries after the initial attempt.
    #[serde(default)]
    pub max_retries: u32,
    /// Delay between attempts, in milliseconds.
    #[serde(default)]
    pub retry_delay_ms: u64,
    /// Failure handling once retries are exhausted (or disabled).
    #[serde(default)]
    pub on_error: OnErrorPolicy,
}

impl NodeSettings {
    /// Enable retries with the given ceiling and delay.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.retry_on_failed = true;
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Set the on-error policy.
    #[must_use]
    pub fn with_on_error(mut self, policy: OnErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            retry_on_failed: false,
            max_retries: 0,
            retry_delay_ms: 0,
            on_error: OnErrorPolicy::StopWorkflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_stop_workflow_no_retry() {
        let settings = NodeSettings::default();
        assert!(!settings.retry_on_failed);
        assert_eq!(settings.max_retries, 0);
        assert_eq!(settings.retry_delay_ms, 0);
        assert_eq!(settings.on_error, OnErrorPolicy::StopWorkflow);
    }

    #[test]
    fn with_retries_enables_flag() {
        let settings = NodeSettings::default().with_retries(2, 10);
        assert!(settings.retry_on_failed);
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.retry_delay_ms, 10);
    }

    #[test]
    fn policy_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&OnErrorPolicy::ContinueErrorOutput).unwrap(),
            r#""continue_error_output""#
        );
        assert_eq!(
            serde_json::to_string(&OnErrorPolicy::StopWorkflow).unwrap(),
            r#""stop_workflow""#
        );
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let settings: NodeSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, NodeSettings::default());
    }

    #[test]
    fn serde_roundtrip() {
        let settings = NodeSettings::default()
            .with_retries(3, 500)
            .with_on_error(OnErrorPolicy::Continue);
        let json = serde_json::to_string(&settings).unwrap();
        let back: NodeSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, back);
    }
}
